//! Short-horizon trend: least-squares slope over backward-looking samples.

use crate::data::Dataset;
use crate::sampler::sample_article;

/// Samples taken across the trend window.
pub const TREND_SAMPLES: usize = 10;

/// Ordinary least-squares slope of `y` against `x`; 0 when undefined.
pub fn ols_slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for &(x, y) in points {
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }
    let n = n as f64;
    let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x);
    if slope.is_finite() {
        slope
    } else {
        0.0
    }
}

/// Estimated change over the last `window_minutes` for one article.
///
/// Samples at offsets `0, -step, .., -(TREND_SAMPLES-1)*step` with
/// `step = window_minutes / TREND_SAMPLES`, fits a line through
/// (offset, value) and returns `slope * window_minutes`.
pub fn trend_article(
    dataset: &Dataset,
    article: usize,
    date_index: i64,
    minute: f64,
    window_minutes: f64,
) -> f64 {
    let step = window_minutes / TREND_SAMPLES as f64;
    let mut points = [(0.0, 0.0); TREND_SAMPLES];
    for (i, point) in points.iter_mut().enumerate() {
        let offset = i as f64 * step;
        let value = sample_article(dataset, article, date_index, minute - offset);
        *point = (-offset, value);
    }
    let delta = ols_slope(&points) * window_minutes;
    if delta.is_finite() {
        delta
    } else {
        0.0
    }
}

/// Title-keyed trend; unknown titles have no trend.
pub fn trend(dataset: &Dataset, title: &str, date_index: i64, minute: f64, window_minutes: f64) -> f64 {
    match dataset.article_index(title) {
        Some(article) => trend_article(dataset, article, date_index, minute, window_minutes),
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(slope: f64, intercept: f64) -> Dataset {
        let mut ds = Dataset::new(vec!["2024-05-01".to_string(), "2024-05-02".to_string()]);
        for (d, date) in ["2024-05-01", "2024-05-02"].iter().enumerate() {
            let values = (0..1440)
                .map(|m| intercept + slope * (d as f64 * 1440.0 + m as f64))
                .collect();
            ds.insert_series("Line", date, values);
        }
        ds
    }

    #[test]
    fn linear_series_recovers_total_change() {
        let ds = linear(3.0, 500.0);
        let delta = trend(&ds, "Line", 1, 600.0, 90.0);
        assert!((delta - 270.0).abs() < 1e-6, "delta={}", delta);
    }

    #[test]
    fn window_spanning_midnight_uses_previous_day() {
        let ds = linear(-2.0, 10_000.0);
        let delta = trend(&ds, "Line", 1, 30.0, 90.0);
        assert!((delta + 180.0).abs() < 1e-6, "delta={}", delta);
    }

    #[test]
    fn flat_series_has_zero_trend() {
        let ds = linear(0.0, 42.0);
        assert_eq!(trend(&ds, "Line", 0, 700.0, 90.0), 0.0);
    }

    #[test]
    fn zero_window_is_degenerate_not_nan() {
        let ds = linear(1.0, 0.0);
        assert_eq!(trend(&ds, "Line", 0, 700.0, 0.0), 0.0);
    }

    #[test]
    fn ols_needs_two_points() {
        assert_eq!(ols_slope(&[]), 0.0);
        assert_eq!(ols_slope(&[(1.0, 5.0)]), 0.0);
        assert_eq!(ols_slope(&[(1.0, 5.0), (1.0, 9.0)]), 0.0);
        assert!((ols_slope(&[(0.0, 1.0), (2.0, 5.0)]) - 2.0).abs() < 1e-12);
    }
}
