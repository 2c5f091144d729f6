//! Bar entities: creation, retargeting, fading, retirement and motion.
//!
//! `BarSet` is the only owner of bar state. Callers outside the frame pass
//! get shared references and derived `BarView`s.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::color::{color_for, ColorConfig, Hsl};
use crate::config::{AnimConfig, LayoutMetrics};
use crate::format::format_count;
use crate::logging::{log_bar_entered, log_bar_retired};
use crate::ranking::RankedFrame;

pub const MIN_WIDTH_PCT: f64 = 15.0;
pub const MAX_WIDTH_PCT: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub title: String,
    /// Animated vertical offset.
    pub current_position: f64,
    /// Slot the bar is moving toward.
    pub target_position: f64,
    /// Interpolation gain for the next step.
    pub speed_factor: f64,
    /// Dropped out of the top N; moving off-screen.
    pub fading: bool,
    /// Zero-based rank from the last frame the bar was ranked.
    pub rank: usize,
    pub value: f64,
    pub width_pct: f64,
    pub color: Hsl,
}

/// What a host needs to draw one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarView {
    pub title: String,
    pub display_title: String,
    /// One-based.
    pub rank: usize,
    pub value: f64,
    pub value_label: String,
    pub width_pct: f64,
    pub color: String,
    pub position: f64,
    pub opacity: f64,
}

impl Bar {
    fn entering(title: &str, chart_height: f64, min_speed: f64) -> Self {
        Self {
            title: title.to_string(),
            current_position: chart_height,
            target_position: 0.0,
            speed_factor: min_speed,
            fading: false,
            rank: 0,
            value: 0.0,
            width_pct: MIN_WIDTH_PCT,
            color: Hsl::NEUTRAL,
        }
    }

    pub fn opacity(&self) -> f64 {
        if self.fading {
            0.5
        } else {
            1.0
        }
    }

    pub fn view(&self) -> BarView {
        BarView {
            title: self.title.clone(),
            display_title: self.title.replace('_', " "),
            rank: self.rank + 1,
            value: self.value,
            value_label: format_count(self.value),
            width_pct: self.width_pct,
            color: self.color.to_string(),
            position: self.current_position,
            opacity: self.opacity(),
        }
    }

    /// Move toward the target; `dt` is scaled to 60 Hz frames and capped at one.
    fn integrate(&mut self, dt: f64) {
        let time_scale = (dt * 60.0).min(1.0);
        let gain = (self.speed_factor * time_scale).min(1.0);
        self.current_position += (self.target_position - self.current_position) * gain;
    }
}

/// Fill width in percent, clamped to `[15, 100]`.
pub fn width_pct(value: f64, frame_max: f64, log_scale: bool) -> f64 {
    let raw = if log_scale {
        value.max(1.0).ln() / frame_max.max(1.1).ln() * 100.0
    } else {
        value / frame_max * 100.0
    };
    raw.min(MAX_WIDTH_PCT).max(MIN_WIDTH_PCT)
}

/// Larger swings relative to the leader move faster.
pub fn speed_for(delta: f64, frame_max: f64, cfg: &AnimConfig) -> f64 {
    let normalized = if frame_max > 1.0 {
        delta.abs() / frame_max
    } else {
        0.0
    };
    cfg.min_speed + (cfg.max_speed - cfg.min_speed) * normalized
}

/// Read-only inputs for one bar pass.
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub cfg: &'a AnimConfig,
    pub layout: LayoutMetrics,
    pub log_scale: bool,
    pub lang: &'a str,
    pub colors: Option<&'a ColorConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct BarSet {
    bars: Vec<Bar>,
}

impl BarSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }

    pub fn get(&self, title: &str) -> Option<&Bar> {
        self.bars.iter().find(|b| b.title == title)
    }

    /// Ranked bars first by rank, then fading bars in creation order.
    pub fn views(&self) -> Vec<BarView> {
        let mut ranked: Vec<&Bar> = self.bars.iter().filter(|b| !b.fading).collect();
        ranked.sort_by_key(|b| b.rank);
        ranked
            .into_iter()
            .chain(self.bars.iter().filter(|b| b.fading))
            .map(Bar::view)
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.bars.clear();
    }

    fn slot(&mut self, title: &str, ctx: &BarContext<'_>, rank: usize) -> &mut Bar {
        let idx = match self.bars.iter().position(|b| b.title == title) {
            Some(idx) => idx,
            None => {
                log_bar_entered(title, rank);
                self.bars.push(Bar::entering(
                    title,
                    ctx.layout.chart_height,
                    ctx.cfg.min_speed,
                ));
                self.bars.len() - 1
            }
        };
        &mut self.bars[idx]
    }

    /// Reconcile against this frame's ranking, then advance every live bar by `dt`.
    pub(crate) fn update(&mut self, frame: &RankedFrame<'_>, ctx: &BarContext<'_>, dt: f64) {
        let layout = ctx.layout;
        let window = ctx.cfg.derivative_window;

        for (rank, entry) in frame.top.iter().enumerate() {
            let bar = self.slot(entry.title, ctx, rank);
            bar.target_position = rank as f64 * layout.row_height;
            bar.fading = false;
            bar.rank = rank;
            bar.value = entry.value;
            bar.width_pct = width_pct(entry.value, frame.frame_max, ctx.log_scale);
            let slope = entry.delta() / window;
            bar.color = color_for(slope, ctx.lang, ctx.colors);
            bar.speed_factor = speed_for(entry.delta(), frame.frame_max, ctx.cfg);
        }

        let active: HashSet<&str> = frame.top.iter().map(|e| e.title).collect();
        let retire_below = layout.chart_height + ctx.cfg.retire_margin;
        self.bars.retain_mut(|bar| {
            if active.contains(bar.title.as_str()) {
                return true;
            }
            bar.target_position = layout.chart_height + layout.row_height;
            bar.speed_factor = ctx.cfg.min_speed;
            bar.fading = true;
            if bar.current_position > retire_below {
                log_bar_retired(&bar.title, bar.current_position);
                return false;
            }
            true
        });

        for bar in &mut self.bars {
            bar.integrate(dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::RankedEntry;

    fn ctx(cfg: &AnimConfig) -> BarContext<'_> {
        BarContext {
            cfg,
            layout: LayoutMetrics {
                chart_height: 600.0,
                row_height: 60.0,
            },
            log_scale: false,
            lang: "en",
            colors: None,
        }
    }

    fn frame<'a>(entries: &[(&'a str, f64, f64)]) -> RankedFrame<'a> {
        let top: Vec<RankedEntry<'a>> = entries
            .iter()
            .enumerate()
            .map(|(article, (title, value, past))| RankedEntry {
                article,
                title: *title,
                value: *value,
                past_value: *past,
            })
            .collect();
        let frame_max = top.first().map(|e| e.value.max(1.0)).unwrap_or(1.0);
        RankedFrame { top, frame_max }
    }

    #[test]
    fn width_is_clamped() {
        assert_eq!(width_pct(1000.0, 1000.0, false), 100.0);
        assert_eq!(width_pct(1000.0, 1000.0, true), 100.0);
        assert_eq!(width_pct(1.0, 1_000_000.0, false), 15.0);
        assert_eq!(width_pct(1.0, 1_000_000.0, true), 15.0);
        assert_eq!(width_pct(500.0, 1000.0, false), 50.0);
    }

    #[test]
    fn log_width_uses_floor_of_1_1() {
        // frame max of 1 would divide by ln(1) = 0
        assert_eq!(width_pct(1.0, 1.0, true), 15.0);
    }

    #[test]
    fn speed_grows_with_relative_swing() {
        let cfg = AnimConfig::default();
        assert_eq!(speed_for(0.0, 100.0, &cfg), cfg.min_speed);
        assert!((speed_for(100.0, 100.0, &cfg) - cfg.max_speed).abs() < 1e-12);
        assert_eq!(speed_for(100.0, 1.0, &cfg), cfg.min_speed);
    }

    #[test]
    fn new_bars_enter_from_below() {
        let cfg = AnimConfig::default();
        let mut bars = BarSet::new();
        bars.update(&frame(&[("A", 100.0, 100.0), ("B", 50.0, 50.0)]), &ctx(&cfg), 0.0);
        let a = bars.get("A").unwrap();
        assert_eq!(a.current_position, 600.0);
        assert_eq!(a.target_position, 0.0);
        assert_eq!(bars.get("B").unwrap().target_position, 60.0);
    }

    #[test]
    fn integration_is_capped_per_step() {
        let cfg = AnimConfig::default();
        let mut bars = BarSet::new();
        let f = frame(&[("A", 100.0, 100.0)]);
        bars.update(&f, &ctx(&cfg), 1.0 / 60.0);
        let after_one = bars.get("A").unwrap().current_position;
        assert!((after_one - (600.0 - 600.0 * 0.03)).abs() < 1e-9);

        // a huge dt still only applies one 60 Hz step
        let mut big = BarSet::new();
        big.update(&f, &ctx(&cfg), 5.0);
        assert!((big.get("A").unwrap().current_position - after_one).abs() < 1e-9);
    }

    #[test]
    fn dropped_bars_fade_and_head_off_screen() {
        let cfg = AnimConfig::default();
        let mut bars = BarSet::new();
        bars.update(&frame(&[("A", 100.0, 100.0), ("B", 50.0, 50.0)]), &ctx(&cfg), 0.0);
        bars.update(&frame(&[("A", 100.0, 100.0)]), &ctx(&cfg), 1.0 / 60.0);
        let b = bars.get("B").unwrap();
        assert!(b.fading);
        assert_eq!(b.target_position, 660.0);
        assert_eq!(b.speed_factor, cfg.min_speed);
        assert_eq!(b.view().opacity, 0.5);
    }

    #[test]
    fn bars_far_below_chart_are_retired() {
        let cfg = AnimConfig::default();
        let mut bars = BarSet::new();
        let mut c = ctx(&cfg);
        bars.update(&frame(&[("A", 100.0, 100.0), ("B", 50.0, 50.0)]), &c, 0.0);
        // chart shrinks; B's position (still at the old bottom) is now far past it
        c.layout = LayoutMetrics {
            chart_height: 300.0,
            row_height: 30.0,
        };
        bars.update(&frame(&[("A", 100.0, 100.0)]), &c, 0.0);
        assert!(bars.get("B").is_none());
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn views_are_rank_ordered_with_fading_last() {
        let cfg = AnimConfig::default();
        let mut bars = BarSet::new();
        bars.update(
            &frame(&[("A", 100.0, 100.0), ("B", 50.0, 50.0), ("C", 10.0, 10.0)]),
            &ctx(&cfg),
            0.0,
        );
        bars.update(&frame(&[("C", 200.0, 20.0), ("A", 100.0, 100.0)]), &ctx(&cfg), 0.0);
        let titles: Vec<String> = bars.views().into_iter().map(|v| v.title).collect();
        assert_eq!(titles, vec!["C", "A", "B"]);
        let top = &bars.views()[0];
        assert_eq!(top.rank, 1);
        assert_eq!(top.value_label, "200");
    }

    #[test]
    fn view_formats_title_and_color() {
        let cfg = AnimConfig::default();
        let mut bars = BarSet::new();
        bars.update(&frame(&[("Grand_Prix", 1234.0, 1234.0)]), &ctx(&cfg), 0.0);
        let view = bars.views().remove(0);
        assert_eq!(view.display_title, "Grand Prix");
        assert_eq!(view.value_label, "1,234");
        assert_eq!(view.color, "hsl(180, 10%, 30%)");
    }
}
