//! Per-frame evaluation and top-N selection.

use crate::data::Dataset;
use crate::sampler::sample_article;
use crate::trend::trend_article;

/// One title with a positive value at the current instant.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry<'a> {
    pub article: usize,
    pub title: &'a str,
    pub value: f64,
    /// `value - trend`, the smoothed value one derivative window ago.
    pub past_value: f64,
}

impl RankedEntry<'_> {
    pub fn delta(&self) -> f64 {
        self.value - self.past_value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedFrame<'a> {
    /// At most `bar_count` entries, highest value first.
    pub top: Vec<RankedEntry<'a>>,
    /// `max(1, top value)`, 1 when nothing ranks.
    pub frame_max: f64,
}

/// Every title with a positive value, in dataset order.
pub fn snapshot<'a>(
    dataset: &'a Dataset,
    date_index: usize,
    minute: f64,
    window_minutes: f64,
) -> Vec<RankedEntry<'a>> {
    let d = date_index as i64;
    dataset
        .titles()
        .iter()
        .enumerate()
        .filter_map(|(article, title)| {
            let value = sample_article(dataset, article, d, minute);
            if value <= 0.0 {
                return None;
            }
            let delta = trend_article(dataset, article, d, minute, window_minutes);
            Some(RankedEntry {
                article,
                title: title.as_str(),
                value,
                past_value: value - delta,
            })
        })
        .collect()
}

/// Stable descending sort, so equal values keep dataset order frame to frame.
pub fn select_top(mut entries: Vec<RankedEntry<'_>>, bar_count: usize) -> RankedFrame<'_> {
    entries.sort_by(|a, b| b.value.total_cmp(&a.value));
    entries.truncate(bar_count);
    let frame_max = entries.first().map(|e| e.value.max(1.0)).unwrap_or(1.0);
    RankedFrame {
        top: entries,
        frame_max,
    }
}

pub fn rank_frame<'a>(
    dataset: &'a Dataset,
    date_index: usize,
    minute: f64,
    window_minutes: f64,
    bar_count: usize,
) -> RankedFrame<'a> {
    select_top(snapshot(dataset, date_index, minute, window_minutes), bar_count)
}
