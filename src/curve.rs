//! Daily totals → per-minute curves via monotone cubic (PCHIP) interpolation.
//!
//! Knots sit one day apart at hours -24, 0, 24, 48, 72 for the days two
//! before through two after the target. The target day's curve is the
//! segment between hour 0 (previous day's total) and hour 24 (target total).

use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::data::DATE_FORMAT;

pub const MINUTES: usize = 1440;

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// One-sided three-point derivative at an end knot, kept shape-preserving.
fn edge_derivative(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if sign(d) != sign(m0) {
        0.0
    } else if sign(m0) != sign(m1) && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}

/// Knot derivatives (Fritsch–Butland weighted harmonic mean in the interior).
pub fn pchip_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let m: Vec<f64> = (0..n - 1).map(|k| (y[k + 1] - y[k]) / h[k]).collect();
    if n == 2 {
        return vec![m[0], m[0]];
    }

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        let (m0, m1) = (m[k - 1], m[k]);
        if sign(m0) != sign(m1) || m0 == 0.0 || m1 == 0.0 {
            continue;
        }
        let w1 = 2.0 * h[k] + h[k - 1];
        let w2 = h[k] + 2.0 * h[k - 1];
        d[k] = (w1 + w2) / (w1 / m0 + w2 / m1);
    }
    d[0] = edge_derivative(h[0], h[1], m[0], m[1]);
    d[n - 1] = edge_derivative(h[n - 2], h[n - 3], m[n - 2], m[n - 3]);
    d
}

/// Evaluate the Hermite cubic through `(x, y)` with slopes `d` at `t`.
pub fn pchip_eval(x: &[f64], y: &[f64], d: &[f64], t: f64) -> f64 {
    let n = x.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return y[0];
    }
    let k = match x.iter().rposition(|&xk| xk <= t) {
        Some(k) if k < n - 1 => k,
        Some(_) => n - 2,
        None => 0,
    };
    let h = x[k + 1] - x[k];
    let s = (t - x[k]) / h;
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    h00 * y[k] + h10 * h * d[k] + h01 * y[k + 1] + h11 * h * d[k + 1]
}

/// Minute curve for `target` from a date → daily-total map.
///
/// Missing days before the target count as 0, missing days after it repeat
/// the target's total. All-zero input gives a flat zero day.
pub fn interpolate_day(daily: &HashMap<String, f64>, target: NaiveDate) -> Vec<u64> {
    let target_key = target.format(DATE_FORMAT).to_string();
    let target_total = daily.get(&target_key).copied().unwrap_or(0.0);

    let mut x = Vec::with_capacity(5);
    let mut y = Vec::with_capacity(5);
    for i in -2i64..=2 {
        let key = (target + Duration::days(i)).format(DATE_FORMAT).to_string();
        let v = match daily.get(&key) {
            Some(v) => *v,
            None if i < 0 => 0.0,
            None => target_total,
        };
        x.push(((i + 1) * 24) as f64);
        y.push(v);
    }

    if y.iter().sum::<f64>() == 0.0 {
        return vec![0; MINUTES];
    }

    let d = pchip_slopes(&x, &y);
    let step = 24.0 / MINUTES as f64;
    (0..MINUTES)
        .map(|k| {
            let v = pchip_eval(&x, &y, &d, k as f64 * step);
            if v.is_finite() && v > 0.0 {
                v as u64
            } else {
                0
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub articles: usize,
    pub curves: usize,
    pub pruned: usize,
}

/// Recompute `minutes` from `daily_raw` for every kept date of a history
/// document, and drop minute entries for dates no longer kept.
pub fn rebuild_history(history: &mut Value) -> Result<RebuildStats> {
    let dates: Vec<String> = history
        .get("dates")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("history has no dates array"))?
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    let keep: HashSet<&str> = dates.iter().map(String::as_str).collect();
    let articles = history
        .get_mut("articles")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| anyhow!("history has no articles object"))?;

    let mut stats = RebuildStats::default();
    for (_, article) in articles.iter_mut() {
        let Some(article) = article.as_object_mut() else {
            continue;
        };
        stats.articles += 1;
        let daily: HashMap<String, f64> = article
            .get("daily_raw")
            .and_then(Value::as_object)
            .map(|raw| {
                raw.iter()
                    .filter_map(|(k, v)| v.as_f64().map(|v| (k.clone(), v)))
                    .collect()
            })
            .unwrap_or_default();

        let minutes = article
            .entry("minutes")
            .or_insert_with(|| Value::Object(Map::new()));
        if !minutes.is_object() {
            *minutes = Value::Object(Map::new());
        }
        let Some(minutes) = minutes.as_object_mut() else {
            continue;
        };

        for date in &dates {
            if !daily.contains_key(date) {
                continue;
            }
            let Ok(day) = NaiveDate::parse_from_str(date, DATE_FORMAT) else {
                continue;
            };
            let curve = interpolate_day(&daily, day);
            minutes.insert(date.clone(), Value::from(curve));
            stats.curves += 1;
        }

        let before = minutes.len();
        minutes.retain(|k, _| keep.contains(k.as_str()));
        stats.pruned += before - minutes.len();
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn daily(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn all_zero_is_flat() {
        let curve = interpolate_day(&HashMap::new(), date("2024-01-10"));
        assert_eq!(curve.len(), MINUTES);
        assert!(curve.iter().all(|v| *v == 0));
    }

    #[test]
    fn constant_totals_give_constant_curve() {
        let d = daily(&[
            ("2024-01-08", 500.0),
            ("2024-01-09", 500.0),
            ("2024-01-10", 500.0),
        ]);
        let curve = interpolate_day(&d, date("2024-01-10"));
        assert!(curve.iter().all(|v| (499..=500).contains(v)), "{:?}", &curve[..5]);
    }

    #[test]
    fn curve_starts_at_previous_total_and_stays_monotone() {
        let d = daily(&[
            ("2024-01-08", 100.0),
            ("2024-01-09", 200.0),
            ("2024-01-10", 1000.0),
        ]);
        let curve = interpolate_day(&d, date("2024-01-10"));
        assert_eq!(curve[0], 200);
        assert!(curve[MINUTES - 1] <= 1000 && curve[MINUTES - 1] > 900);
        assert!(curve.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn slopes_vanish_at_local_extrema() {
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 5.0, 0.0];
        let d = pchip_slopes(&x, &y);
        assert_eq!(d[1], 0.0);
        assert_eq!(pchip_eval(&x, &y, &d, 1.0), 5.0);
    }

    #[test]
    fn rebuild_recomputes_and_prunes() {
        let mut history = json!({
            "dates": ["2024-01-09", "2024-01-10"],
            "articles": {
                "A": {
                    "daily_raw": {"2024-01-09": 10, "2024-01-10": 10},
                    "minutes": {"2023-12-01": [1, 2, 3]}
                },
                "B": {"daily_raw": {}}
            }
        });
        let stats = rebuild_history(&mut history).unwrap();
        assert_eq!(stats.articles, 2);
        assert_eq!(stats.curves, 2);
        assert_eq!(stats.pruned, 1);
        let minutes = history["articles"]["A"]["minutes"].as_object().unwrap();
        assert_eq!(minutes.len(), 2);
        assert_eq!(minutes["2024-01-10"].as_array().unwrap().len(), MINUTES);
    }
}
