//! Simulation state and the frame pass: advance time, rank, move bars.
//!
//! All mutable animation state lives in one `SimulationState` owned by a
//! `Simulation`. Hosts drive it through `advance`, `render_frame`,
//! `step_frame` and `seek_to_frame`, and read back `FrameView`s.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::bars::{BarContext, BarSet, BarView};
use crate::clock::{PlaybackMode, SimClock};
use crate::color::ColorConfig;
use crate::config::{AnimConfig, LayoutMetrics, MINUTES_PER_DAY};
use crate::data::Dataset;
use crate::format::time_label;
use crate::logging::{log_dataset_loaded, log_day_rollover, log_seek, log_seek_degraded, ProfileScope};
use crate::ranking::rank_frame;
use crate::sampler::normalize;

#[derive(Debug, Clone)]
pub struct SimulationState {
    pub clock: SimClock,
    pub layout: LayoutMetrics,
    pub log_scale: bool,
    pub lang: String,
    dataset: Option<Arc<Dataset>>,
    colors: Option<ColorConfig>,
    bars: BarSet,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            clock: SimClock::default(),
            layout: LayoutMetrics::default(),
            log_scale: true,
            lang: "en".to_string(),
            dataset: None,
            colors: None,
            bars: BarSet::new(),
        }
    }
}

impl SimulationState {
    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_deref()
    }

    pub fn colors(&self) -> Option<&ColorConfig> {
        self.colors.as_ref()
    }

    pub fn bars(&self) -> &BarSet {
        &self.bars
    }

    pub fn current_date(&self) -> Option<&str> {
        self.dataset()
            .and_then(|d| d.dates().get(self.clock.date_index))
            .map(String::as_str)
    }
}

/// Dates a seek is anchored on, as the capture tooling passes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekAnchor {
    /// Day being recorded. Unknown or absent keeps the clock's current date.
    pub date: Option<String>,
    /// Day before it, used when the pre-roll starts before midnight.
    pub prev_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeekReport {
    pub date_index: usize,
    pub start_minute: f64,
    pub frames_simulated: u64,
    /// Pre-roll could not reach back far enough and was skipped.
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameView {
    pub date: String,
    pub time_label: String,
    pub bars: Vec<BarView>,
}

#[derive(Debug, Clone, Default)]
pub struct Simulation {
    cfg: AnimConfig,
    state: SimulationState,
}

impl Simulation {
    pub fn new(cfg: AnimConfig) -> Self {
        Self {
            cfg,
            state: SimulationState::default(),
        }
    }

    pub fn cfg(&self) -> &AnimConfig {
        &self.cfg
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn set_speed(&mut self, speed: f64) {
        if speed.is_finite() && speed >= 0.0 {
            self.state.clock.speed = speed;
        }
    }

    pub fn set_mode(&mut self, mode: PlaybackMode) {
        self.state.clock.mode = mode;
    }

    pub fn set_log_scale(&mut self, log_scale: bool) {
        self.state.log_scale = log_scale;
    }

    /// New chart geometry; the host re-renders with `render_frame(0.0)` when paused.
    pub fn set_layout(&mut self, layout: LayoutMetrics) {
        self.state.layout = layout;
    }

    /// Drop all bars. Required before switching between play and seek.
    pub fn reset(&mut self) {
        self.state.bars.clear();
    }

    /// Place the clock without simulating anything in between.
    pub fn set_time(&mut self, date_index: usize, minute_of_day: f64) {
        self.state.clock.date_index = date_index;
        self.state.clock.minute_of_day = minute_of_day;
    }

    /// Swap in a language's dataset and color config.
    ///
    /// Normal mode pre-runs fixed frames so trends have history when playback
    /// starts; capture mode renders a single frame and waits to be seeked.
    pub fn load(
        &mut self,
        lang: &str,
        dataset: Arc<Dataset>,
        colors: Option<ColorConfig>,
        initial_date: Option<&str>,
    ) {
        self.state.bars.clear();
        self.state.lang = lang.to_string();
        log_dataset_loaded(lang, dataset.dates().len(), dataset.titles().len());
        let date_index = initial_date
            .and_then(|d| dataset.date_position(d))
            .unwrap_or(0);
        self.state.dataset = Some(dataset);
        self.state.colors = colors;
        self.set_time(date_index, 0.0);

        match self.state.clock.mode {
            PlaybackMode::Normal => self.pre_run(),
            PlaybackMode::Capture => self.render_frame(self.cfg.frame_dt()),
        }
    }

    fn pre_run(&mut self) {
        let step = self.cfg.frame_dt();
        let per_step = self.state.clock.minutes_for(step, &self.cfg);
        if !(per_step > 0.0 && per_step.is_finite()) {
            return;
        }
        let target = self.cfg.pre_run_minutes.min(MINUTES_PER_DAY);
        let max_steps = (target / per_step).ceil() as u64 + 1;
        for _ in 0..max_steps {
            if self.state.clock.minute_of_day >= target {
                break;
            }
            self.advance(step);
        }
    }

    /// Move simulated time forward by `dt` seconds and render the new instant.
    pub fn advance(&mut self, dt: f64) {
        let Some(date_count) = self.state.dataset().map(|d| d.dates().len()) else {
            return;
        };
        if date_count == 0 {
            return;
        }
        let rolled = self.state.clock.advance(dt, &self.cfg, date_count);
        if rolled > 0 {
            let date = self.state.current_date().unwrap_or_default().to_string();
            log_day_rollover(self.state.clock.date_index, &date);
        }
        self.render_frame(dt);
    }

    /// One fixed `1/fps` step, as capture tooling advances.
    pub fn step_frame(&mut self) {
        self.advance(self.cfg.frame_dt());
    }

    /// Re-rank at the current instant and move bars by `dt` without advancing time.
    pub fn render_frame(&mut self, dt: f64) {
        let _scope = ProfileScope::new("render_frame");
        let state = &mut self.state;
        let Some(dataset) = state.dataset.as_deref() else {
            return;
        };
        if dataset.is_empty() {
            return;
        }
        if state.clock.date_index >= dataset.dates().len() {
            state.clock.date_index = 0;
        }

        let frame = rank_frame(
            dataset,
            state.clock.date_index,
            state.clock.minute_of_day,
            self.cfg.derivative_window,
            self.cfg.bar_count,
        );
        let ctx = BarContext {
            cfg: &self.cfg,
            layout: state.layout,
            log_scale: state.log_scale,
            lang: &state.lang,
            colors: state.colors.as_ref(),
        };
        state.bars.update(&frame, &ctx, dt);
    }

    /// Rebuild state for recording from `start_frame`.
    ///
    /// Clears all bars, places the clock `pre_roll_frames` fixed frames before
    /// `start_frame` on the anchor date and simulates forward to it. A start
    /// before midnight continues from the previous date; if that date cannot be
    /// resolved the clock starts at minute 0 of the anchor date and nothing is
    /// simulated.
    pub fn seek_to_frame(&mut self, start_frame: i64, pre_roll_frames: i64, anchor: &SeekAnchor) -> SeekReport {
        self.state.bars.clear();

        let Some(dataset) = self.state.dataset.clone() else {
            return SeekReport {
                date_index: self.state.clock.date_index,
                start_minute: self.state.clock.minute_of_day,
                frames_simulated: 0,
                degraded: true,
            };
        };
        let anchor_index = anchor
            .date
            .as_deref()
            .and_then(|d| dataset.date_position(d))
            .unwrap_or(self.state.clock.date_index);

        let sim_start = start_frame - pre_roll_frames;
        let start_minute = sim_start as f64 * self.cfg.minutes_per_frame();
        let mut frames = pre_roll_frames.max(0) as u64;
        let mut degraded = false;

        let (date_index, minute) = if start_minute < 0.0 {
            let prev = anchor.prev_date.as_deref().and_then(|d| dataset.date_position(d));
            match prev.map(|p| normalize(p as i64, MINUTES_PER_DAY + start_minute)) {
                Some((d, m)) if d >= 0 => (d as usize, m),
                _ => {
                    log_seek_degraded(start_frame, pre_roll_frames, anchor.prev_date.as_deref());
                    degraded = true;
                    frames = 0;
                    (anchor_index, 0.0)
                }
            }
        } else {
            (anchor_index, start_minute)
        };

        self.set_time(date_index, minute);
        log_seek(start_frame, pre_roll_frames, date_index, minute, frames);
        for _ in 0..frames {
            self.step_frame();
        }

        SeekReport {
            date_index,
            start_minute: minute,
            frames_simulated: frames,
            degraded,
        }
    }

    /// Presentation snapshot of the current instant.
    pub fn frame_view(&self) -> Option<FrameView> {
        let date = self.state.current_date()?.to_string();
        Some(FrameView {
            time_label: time_label(&date, self.state.clock.minute_of_day),
            date,
            bars: self.state.bars.views(),
        })
    }

    /// SHA-256 over the clock and quantized bar state.
    pub fn digest(&self) -> String {
        let q = |v: f64| ((v * 1e6).round() as i64).to_le_bytes();
        let mut hasher = Sha256::new();
        hasher.update((self.state.clock.date_index as u64).to_le_bytes());
        hasher.update(q(self.state.clock.minute_of_day));
        for bar in self.state.bars.iter() {
            hasher.update(bar.title.as_bytes());
            hasher.update([0u8, bar.fading as u8]);
            hasher.update(q(bar.current_position));
            hasher.update(q(bar.target_position));
            hasher.update(q(bar.speed_factor));
        }
        hex::encode(hasher.finalize())
    }
}
