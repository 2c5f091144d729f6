//! Simulated time: date index plus fractional minute of day.

use serde::{Deserialize, Serialize};

use crate::config::{AnimConfig, MINUTES_PER_DAY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    Normal,
    /// Deterministic recording: effective speed is pinned to 1.
    Capture,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    pub date_index: usize,
    pub minute_of_day: f64,
    /// User-selected playback speed.
    pub speed: f64,
    pub mode: PlaybackMode,
}

impl Default for SimClock {
    fn default() -> Self {
        Self {
            date_index: 0,
            minute_of_day: 0.0,
            speed: 1.0,
            mode: PlaybackMode::Normal,
        }
    }
}

impl SimClock {
    pub fn effective_speed(&self) -> f64 {
        match self.mode {
            PlaybackMode::Capture => 1.0,
            PlaybackMode::Normal => self.speed,
        }
    }

    /// Simulated minutes produced by `dt` wall seconds.
    pub fn minutes_for(&self, dt: f64, cfg: &AnimConfig) -> f64 {
        cfg.minutes_per_second() * dt * self.effective_speed()
    }

    /// Advance by `dt` seconds, looping past the last date back to the first.
    /// Returns the number of day boundaries crossed.
    pub fn advance(&mut self, dt: f64, cfg: &AnimConfig, date_count: usize) -> u32 {
        if date_count == 0 {
            return 0;
        }
        let minutes = self.minutes_for(dt, cfg);
        if !minutes.is_finite() {
            return 0;
        }
        self.minute_of_day += minutes;
        if self.minute_of_day < MINUTES_PER_DAY {
            return 0;
        }

        let mut rem = self.minute_of_day.rem_euclid(MINUTES_PER_DAY);
        let mut days = ((self.minute_of_day - rem) / MINUTES_PER_DAY).round();
        if rem >= MINUTES_PER_DAY {
            rem -= MINUTES_PER_DAY;
            days += 1.0;
        }
        self.minute_of_day = rem;
        let step = (days % date_count as f64) as usize;
        self.date_index = (self.date_index % date_count + step) % date_count;
        days.min(u32::MAX as f64) as u32
    }
}
