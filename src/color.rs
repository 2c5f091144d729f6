//! Trend slope → bar color.
//!
//! Growth reads red, decline reads purple, flat reads green. Past the
//! per-language threshold the hue saturates and the bar darkens.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorConfig {
    pub base_threshold: f64,
    #[serde(default)]
    pub scaling_factors: HashMap<String, f64>,
}

impl ColorConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parse color config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("load {}", path.display()))
    }

    /// Slope at which the hue saturates for `lang`. Unknown languages and
    /// zero or non-finite factors use 1.0.
    pub fn threshold(&self, lang: &str) -> f64 {
        let factor = self
            .scaling_factors
            .get(lang)
            .copied()
            .filter(|f| *f != 0.0 && f.is_finite())
            .unwrap_or(1.0);
        self.base_threshold * factor
    }
}

/// Hue in degrees, saturation and lightness in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl Hsl {
    pub const NEUTRAL: Hsl = Hsl {
        h: 180.0,
        s: 10.0,
        l: 30.0,
    };
}

/// CSS notation, e.g. `hsl(120, 90%, 55%)`.
impl fmt::Display for Hsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hsl({}, {}%, {}%)", self.h, self.s, self.l)
    }
}

/// Color for a per-minute slope in `lang`. No config, or a ratio that cannot
/// be formed, gives the neutral color.
pub fn color_for(slope: f64, lang: &str, config: Option<&ColorConfig>) -> Hsl {
    let Some(config) = config else {
        return Hsl::NEUTRAL;
    };
    let ratio = slope / config.threshold(lang);
    if !ratio.is_finite() {
        return Hsl::NEUTRAL;
    }

    let clamped = ratio.clamp(-1.0, 1.0);
    let h = if clamped > 0.0 {
        120.0 - clamped * 120.0
    } else {
        120.0 - clamped * 150.0
    };
    let overdrive = (ratio.abs() - 1.0).clamp(0.0, 1.0);
    let l = 55.0 - overdrive * 20.0;

    Hsl { h, s: 90.0, l }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ColorConfig {
        ColorConfig::from_json_str(r#"{"baseThreshold":100.0,"scalingFactors":{"en":1.0,"it":0.25,"zz":0}}"#)
            .unwrap()
    }

    #[test]
    fn flat_is_green() {
        let cfg = config();
        for lang in ["en", "it", "unknown"] {
            let c = color_for(0.0, lang, Some(&cfg));
            assert_eq!(c, Hsl { h: 120.0, s: 90.0, l: 55.0 });
        }
        assert_eq!(color_for(0.0, "en", Some(&cfg)).to_string(), "hsl(120, 90%, 55%)");
    }

    #[test]
    fn growth_runs_to_red_and_decline_to_purple() {
        let cfg = config();
        assert_eq!(color_for(50.0, "en", Some(&cfg)).h, 60.0);
        assert_eq!(color_for(100.0, "en", Some(&cfg)).h, 0.0);
        assert_eq!(color_for(-50.0, "en", Some(&cfg)).h, 195.0);
        assert_eq!(color_for(-100.0, "en", Some(&cfg)).h, 270.0);
    }

    #[test]
    fn overdrive_darkens_up_to_twenty_points() {
        let cfg = config();
        assert_eq!(color_for(150.0, "en", Some(&cfg)).l, 45.0);
        assert_eq!(color_for(1e9, "en", Some(&cfg)).l, 35.0);
        assert_eq!(color_for(-300.0, "en", Some(&cfg)), Hsl { h: 270.0, s: 90.0, l: 35.0 });
    }

    #[test]
    fn language_factor_scales_threshold() {
        let cfg = config();
        // threshold 25 for "it"
        assert_eq!(color_for(25.0, "it", Some(&cfg)).h, 0.0);
        // zero factor falls back to 1.0
        assert_eq!(cfg.threshold("zz"), 100.0);
    }

    #[test]
    fn degenerate_inputs_are_neutral() {
        assert_eq!(color_for(10.0, "en", None), Hsl::NEUTRAL);
        let zero = ColorConfig {
            base_threshold: 0.0,
            scaling_factors: HashMap::new(),
        };
        assert_eq!(color_for(10.0, "en", Some(&zero)), Hsl::NEUTRAL);
        assert_eq!(color_for(f64::NAN, "en", Some(&config())), Hsl::NEUTRAL);
        assert_eq!(Hsl::NEUTRAL.to_string(), "hsl(180, 10%, 30%)");
    }
}
