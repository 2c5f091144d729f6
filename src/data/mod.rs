//! Read-only view-count history: dates, article titles, per-minute series.
//!
//! The on-disk shape is the `history_<lang>.json` document:
//! `{ "dates": [..], "articles": { title: { "minutes": { date: [..] } } } }`.
//! Article order is the document order; ranking ties depend on it.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::MINUTES_PER_DAY;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct RawHistory {
    #[serde(default)]
    dates: Vec<String>,
    #[serde(default)]
    articles: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    dates: Vec<String>,
    date_index: HashMap<String, usize>,
    titles: Vec<String>,
    title_index: HashMap<String, usize>,
    /// `series[article][date]`, `None` where the article has no entry for that date.
    series: Vec<Vec<Option<Vec<f64>>>>,
}

impl Dataset {
    pub fn new(dates: Vec<String>) -> Self {
        let date_index = dates
            .iter()
            .enumerate()
            .map(|(i, d)| (d.clone(), i))
            .collect();
        Self {
            dates,
            date_index,
            ..Default::default()
        }
    }

    /// Set one day of minute samples for `title`, registering the title on first use.
    /// Unknown dates are ignored.
    pub fn insert_series(&mut self, title: &str, date: &str, minutes: Vec<f64>) {
        let Some(&d) = self.date_index.get(date) else {
            return;
        };
        let a = self.article_slot(title);
        self.series[a][d] = Some(minutes);
    }

    fn article_slot(&mut self, title: &str) -> usize {
        if let Some(&i) = self.title_index.get(title) {
            return i;
        }
        let i = self.titles.len();
        self.titles.push(title.to_string());
        self.title_index.insert(title.to_string(), i);
        self.series.push(vec![None; self.dates.len()]);
        i
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: RawHistory = serde_json::from_str(text).context("parse history json")?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawHistory = serde_json::from_value(value).context("decode history json")?;
        Ok(Self::from_raw(raw))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("load {}", path.display()))
    }

    fn from_raw(raw: RawHistory) -> Self {
        let mut dataset = Self::new(raw.dates);
        for (title, article) in raw.articles {
            let a = dataset.article_slot(&title);
            let Some(minutes) = article.get("minutes").and_then(Value::as_object) else {
                continue;
            };
            for (d, date) in dataset.dates.iter().enumerate() {
                if let Some(arr) = minutes.get(date).and_then(Value::as_array) {
                    let values = arr.iter().map(|v| v.as_f64().unwrap_or(0.0)).collect();
                    dataset.series[a][d] = Some(values);
                }
            }
        }
        dataset
    }

    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn date_position(&self, date: &str) -> Option<usize> {
        self.date_index.get(date).copied()
    }

    pub fn article_index(&self, title: &str) -> Option<usize> {
        self.title_index.get(title).copied()
    }

    /// Minute samples for one article on one date.
    pub fn series(&self, article: usize, date_index: usize) -> Option<&[f64]> {
        self.series
            .get(article)
            .and_then(|days| days.get(date_index))
            .and_then(|day| day.as_deref())
    }
}

/// `<data_dir>/history_<lang>.json`
pub fn history_path(data_dir: &Path, lang: &str) -> PathBuf {
    data_dir.join(format!("history_{}.json", lang))
}

// =============================================================================
// Manifest / quality report
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryManifest {
    pub path: String,
    pub hash_sha256: String,
    pub date_count: usize,
    pub article_count: usize,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    /// (title, date) pairs holding fewer than 1440 samples.
    pub short_series: u64,
    /// Articles without a single day of samples.
    pub empty_articles: Vec<String>,
    pub warnings: Vec<String>,
    pub generated_at_epoch: u64,
}

impl HistoryManifest {
    pub fn ok(&self) -> bool {
        self.warnings.is_empty()
    }
}

pub fn analyze_history(path: &Path, now_ts: u64) -> Result<HistoryManifest> {
    let hash = file_sha256(path)?;
    let dataset = Dataset::load(path)?;
    let mut warnings = Vec::new();

    let mut prev: Option<NaiveDate> = None;
    for date in dataset.dates() {
        match NaiveDate::parse_from_str(date, DATE_FORMAT) {
            Ok(d) => {
                if let Some(p) = prev {
                    if d <= p {
                        warnings.push(format!("non_chronological_date: prev={} current={}", p, d));
                    }
                }
                prev = Some(d);
            }
            Err(err) => warnings.push(format!("bad_date: {} ({})", date, err)),
        }
    }

    let full_day = MINUTES_PER_DAY as usize;
    let mut short_series = 0u64;
    let mut empty_articles = Vec::new();
    for (a, title) in dataset.titles().iter().enumerate() {
        let mut days = 0usize;
        for d in 0..dataset.dates().len() {
            if let Some(values) = dataset.series(a, d) {
                days += 1;
                if values.len() < full_day {
                    short_series += 1;
                }
            }
        }
        if days == 0 {
            empty_articles.push(title.clone());
        }
    }
    if short_series > 0 {
        warnings.push(format!("short_series: {}", short_series));
    }
    if dataset.is_empty() {
        warnings.push("no_dates".to_string());
    }

    Ok(HistoryManifest {
        path: path.display().to_string(),
        hash_sha256: hash,
        date_count: dataset.dates().len(),
        article_count: dataset.titles().len(),
        first_date: dataset.dates().first().cloned(),
        last_date: dataset.dates().last().cloned(),
        short_series,
        empty_articles,
        warnings,
        generated_at_epoch: now_ts,
    })
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn default_manifest_path(dataset_path: &Path) -> PathBuf {
    let mut p = dataset_path.to_path_buf();
    let fname = dataset_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("history.json");
    p.set_file_name(format!("{}.manifest.json", fname));
    p
}
