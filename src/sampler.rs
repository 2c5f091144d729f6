//! Point lookups into the minute series with day-boundary normalization.

use crate::config::MINUTES_PER_DAY;
use crate::data::Dataset;

/// Shift whole days between `minute` and `date_index` until `0 <= minute < 1440`.
///
/// A negative minute lands on the previous date, an overflowing one on the next.
pub fn normalize(date_index: i64, minute: f64) -> (i64, f64) {
    let mut rem = minute.rem_euclid(MINUTES_PER_DAY);
    let mut days = ((minute - rem) / MINUTES_PER_DAY).round();
    // rem_euclid can round onto the upper bound for tiny negative inputs
    if rem >= MINUTES_PER_DAY {
        rem -= MINUTES_PER_DAY;
        days += 1.0;
    }
    // `as` saturates, so far-off minutes pin to the ends of the i64 range
    (date_index.saturating_add(days as i64), rem)
}

/// Value of article `article` at `(date_index, minute)`.
///
/// Returns 0 outside the dataset's date range (no wraparound), for dates the
/// article has no data on, and for non-finite minutes. Short series are read
/// at their last sample.
pub fn sample_article(dataset: &Dataset, article: usize, date_index: i64, minute: f64) -> f64 {
    if !minute.is_finite() {
        return 0.0;
    }
    let (date_index, minute) = normalize(date_index, minute);
    if date_index < 0 || date_index as usize >= dataset.dates().len() {
        return 0.0;
    }
    let Some(values) = dataset.series(article, date_index as usize) else {
        return 0.0;
    };
    if values.is_empty() {
        return 0.0;
    }
    let idx = (minute.floor() as usize).min(values.len() - 1);
    let v = values[idx];
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Title-keyed lookup; unknown titles sample as 0.
pub fn sample(dataset: &Dataset, title: &str, date_index: i64, minute: f64) -> f64 {
    match dataset.article_index(title) {
        Some(article) => sample_article(dataset, article, date_index, minute),
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_dataset() -> Dataset {
        let mut ds = Dataset::new(vec![
            "2024-03-01".to_string(),
            "2024-03-02".to_string(),
            "2024-03-03".to_string(),
        ]);
        for (d, date) in ["2024-03-01", "2024-03-02", "2024-03-03"].iter().enumerate() {
            let base = (d as f64 + 1.0) * 10_000.0;
            ds.insert_series("Ramp", date, (0..1440).map(|m| base + m as f64).collect());
        }
        ds.insert_series("Short", "2024-03-02", vec![7.0, 8.0, 9.0]);
        ds
    }

    #[test]
    fn negative_minute_reads_previous_day() {
        let ds = ramp_dataset();
        assert_eq!(sample(&ds, "Ramp", 1, -30.0), sample(&ds, "Ramp", 0, 1410.0));
        assert_eq!(sample(&ds, "Ramp", 1, -30.0), 11_410.0);
    }

    #[test]
    fn overflowing_minute_reads_next_day() {
        let ds = ramp_dataset();
        assert_eq!(sample(&ds, "Ramp", 0, 1440.0 + 5.5), sample(&ds, "Ramp", 1, 5.0));
        assert_eq!(sample(&ds, "Ramp", 0, 2.0 * 1440.0 + 1.0), 30_001.0);
    }

    #[test]
    fn no_wraparound_across_dataset_ends() {
        let ds = ramp_dataset();
        assert_eq!(sample(&ds, "Ramp", 0, -1.0), 0.0);
        assert_eq!(sample(&ds, "Ramp", 3, 0.0), 0.0);
        assert_eq!(sample(&ds, "Ramp", 2, 1440.0), 0.0);
        assert_eq!(sample(&ds, "Ramp", -5, 100.0), 0.0);
    }

    #[test]
    fn short_series_clamps_to_last_sample() {
        let ds = ramp_dataset();
        assert_eq!(sample(&ds, "Short", 1, 1.9), 8.0);
        assert_eq!(sample(&ds, "Short", 1, 900.0), 9.0);
    }

    #[test]
    fn missing_title_or_day_is_zero() {
        let ds = ramp_dataset();
        assert_eq!(sample(&ds, "Nope", 1, 10.0), 0.0);
        assert_eq!(sample(&ds, "Short", 0, 10.0), 0.0);
        assert_eq!(sample(&ds, "Ramp", 1, f64::NAN), 0.0);
    }

    #[test]
    fn normalize_handles_tiny_negative_minutes() {
        let (d, m) = normalize(4, -1e-20);
        assert!((0.0..1440.0).contains(&m));
        assert!(d == 3 || d == 4);
    }

    #[test]
    fn huge_minutes_sample_as_zero() {
        let ds = ramp_dataset();
        for minute in [1e300, -1e300, 1e18, -1e18, f64::MAX, f64::MIN] {
            assert_eq!(sample(&ds, "Ramp", 1, minute), 0.0, "minute {}", minute);
        }
        let (d, m) = normalize(i64::MAX, 1e300);
        assert_eq!(d, i64::MAX);
        assert!((0.0..1440.0).contains(&m));
        assert_eq!(normalize(0, -1e300).0, i64::MIN);
    }
}
