//! Animation constants, layout metrics and capture settings.
//!
//! Every knob has a compiled default and an environment override, read the same
//! way throughout: parse if present, otherwise fall back.

/// Minutes in one simulated day.
pub const MINUTES_PER_DAY: f64 = 1440.0;

/// Parsed value of `key`, or `default` when unset or unparsable.
pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimConfig {
    /// Number of ranked bars shown.
    pub bar_count: usize,
    /// Real-time seconds mapped to one simulated day.
    pub seconds_per_day: f64,
    /// Trend window in simulated minutes.
    pub derivative_window: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub fps: f64,
    /// Distance below the chart a fading bar must pass before it is dropped.
    pub retire_margin: f64,
    /// Minutes simulated on load in normal mode so trends have history.
    pub pre_run_minutes: f64,
}

impl Default for AnimConfig {
    fn default() -> Self {
        Self {
            bar_count: 10,
            seconds_per_day: 24.0,
            derivative_window: 90.0,
            min_speed: 0.03,
            max_speed: 0.20,
            fps: 60.0,
            retire_margin: 200.0,
            pre_run_minutes: 90.0,
        }
    }
}

impl AnimConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            bar_count: env_or("BAR_COUNT", d.bar_count),
            seconds_per_day: env_or("SECONDS_PER_DAY", d.seconds_per_day),
            derivative_window: env_or("DERIVATIVE_WINDOW", d.derivative_window),
            min_speed: env_or("MIN_SPEED", d.min_speed),
            max_speed: env_or("MAX_SPEED", d.max_speed),
            fps: env_or("FPS", d.fps),
            retire_margin: env_or("RETIRE_MARGIN", d.retire_margin),
            pre_run_minutes: env_or("PRE_RUN_MINUTES", d.pre_run_minutes),
        }
    }

    /// Simulated minutes per real second at speed 1.
    pub fn minutes_per_second(&self) -> f64 {
        MINUTES_PER_DAY / self.seconds_per_day
    }

    /// Fixed step used by seeking, pre-run and capture.
    pub fn frame_dt(&self) -> f64 {
        1.0 / self.fps
    }

    /// Simulated minutes covered by one fixed frame at speed 1.
    pub fn minutes_per_frame(&self) -> f64 {
        self.minutes_per_second() * self.frame_dt()
    }

    /// Frames in one simulated day at capture speed.
    pub fn frames_per_day(&self) -> u64 {
        (self.fps * self.seconds_per_day).round() as u64
    }
}

/// Chart geometry, recomputed by the host on resize and only read by the core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    pub chart_height: f64,
    pub row_height: f64,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            chart_height: 0.0,
            row_height: 60.0,
        }
    }
}

impl LayoutMetrics {
    /// Integer row height so bars land on whole pixels.
    pub fn from_container(chart_height: f64, bar_count: usize) -> Self {
        let rows = bar_count.max(1) as f64;
        Self {
            chart_height,
            row_height: (chart_height / rows).floor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub workers: usize,
    /// Pre-roll length as a multiple of the chunk length.
    pub pre_roll_factor: f64,
    /// Days rendered, ending at the target date.
    pub days: usize,
    pub max_attempts: u32,
    pub out_dir: String,
    /// Container height used for headless layout.
    pub chart_height: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            pre_roll_factor: 1.0,
            days: 7,
            max_attempts: 3,
            out_dir: "out/capture".to_string(),
            chart_height: 900.0,
        }
    }
}

impl CaptureConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            workers: env_or("CAPTURE_WORKERS", d.workers).max(1),
            pre_roll_factor: env_or("PRE_ROLL_FACTOR", d.pre_roll_factor),
            days: env_or("CAPTURE_DAYS", d.days),
            max_attempts: env_or("CAPTURE_MAX_ATTEMPTS", d.max_attempts).max(1),
            out_dir: std::env::var("CAPTURE_OUT_DIR").unwrap_or(d.out_dir),
            chart_height: env_or("CHART_HEIGHT", d.chart_height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_one_frame_to_one_minute() {
        let cfg = AnimConfig::default();
        assert_eq!(cfg.minutes_per_second(), 60.0);
        assert!((cfg.minutes_per_frame() - 1.0).abs() < 1e-12);
        assert_eq!(cfg.frames_per_day(), 1440);
    }

    #[test]
    fn row_height_is_floored() {
        let layout = LayoutMetrics::from_container(605.0, 10);
        assert_eq!(layout.row_height, 60.0);
        assert_eq!(layout.chart_height, 605.0);
    }

    #[test]
    fn zero_bar_count_does_not_divide_by_zero() {
        let layout = LayoutMetrics::from_container(300.0, 0);
        assert_eq!(layout.row_height, 300.0);
    }

    #[test]
    fn env_or_parses_or_falls_back() {
        let key = "ATTENTION_RACE_TEST_ENV_OR";
        std::env::remove_var(key);
        assert_eq!(env_or(key, 3usize), 3);
        std::env::set_var(key, "7");
        assert_eq!(env_or(key, 3usize), 7);
        std::env::set_var(key, "seven");
        assert_eq!(env_or(key, 3usize), 3);
        assert_eq!(env_or(key, 2.5f64), 2.5);
        std::env::remove_var(key);
    }
}
