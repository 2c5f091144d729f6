//! Headless capture: split a day into frame chunks, render each chunk in an
//! isolated simulation, and write the frames as JSONL.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::clock::PlaybackMode;
use crate::color::ColorConfig;
use crate::config::{AnimConfig, LayoutMetrics};
use crate::data::{Dataset, DATE_FORMAT};
use crate::logging::{log, obj, v_str, Domain, Level, ProfileScope};
use crate::sim::{FrameView, SeekAnchor, Simulation};

/// Segments this many days before the end date or later are always re-rendered.
pub const FRESH_DAYS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub index: usize,
    pub start: i64,
    pub end: i64,
    pub pre_roll: i64,
}

impl ChunkPlan {
    pub fn len(&self) -> usize {
        (self.end - self.start).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split `[0, frames_per_day)` into `workers` equal chunks; the last takes the remainder.
pub fn plan_chunks(frames_per_day: u64, workers: usize, pre_roll_factor: f64) -> Vec<ChunkPlan> {
    let workers = workers.max(1);
    let total = frames_per_day as i64;
    let chunk = total / workers as i64;
    let pre_roll = if pre_roll_factor.is_finite() && pre_roll_factor > 0.0 {
        (chunk as f64 * pre_roll_factor).floor() as i64
    } else {
        0
    };

    (0..workers)
        .map(|i| {
            let start = i as i64 * chunk;
            let end = if i + 1 < workers { start + chunk } else { total };
            ChunkPlan {
                index: i,
                start,
                end,
                pre_roll,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPlan {
    pub date: String,
    pub prev_date: Option<String>,
}

impl SegmentPlan {
    pub fn anchor(&self) -> SeekAnchor {
        SeekAnchor {
            date: Some(self.date.clone()),
            prev_date: self.prev_date.clone(),
        }
    }

    /// The previous date this segment pre-rolls from is absent from `dates`.
    /// Such a segment can still be reused from disk but cannot be rendered.
    pub fn missing_pre_roll(&self, dates: &[String]) -> bool {
        matches!(&self.prev_date, Some(prev) if !dates.iter().any(|d| d == prev))
    }
}

/// The `days` calendar dates ending at `end_date` that can be rendered.
///
/// Dates absent from the dataset are skipped. Every segment but the first
/// pre-rolls from the calendar day before it, even when that day has no data
/// (see [`SegmentPlan::missing_pre_roll`]); the first one pre-rolls from the
/// day before only if present.
pub fn plan_segments(dates: &[String], end_date: &str, days: usize) -> Result<Vec<SegmentPlan>> {
    let end = NaiveDate::parse_from_str(end_date, DATE_FORMAT)
        .with_context(|| format!("invalid end date {}", end_date))?;
    let known = |d: &str| dates.iter().any(|x| x == d);
    let fmt = |d: NaiveDate| d.format(DATE_FORMAT).to_string();

    let mut plans = Vec::new();
    for offset in (0..days as i64).rev() {
        let day = end - Duration::days(offset);
        let date = fmt(day);
        let prev = fmt(day - Duration::days(1));
        let first = offset + 1 == days as i64;

        if !known(&date) {
            log_segment_skip(&date, "no data for date");
            continue;
        }
        let prev_date = if known(&prev) || !first {
            Some(prev)
        } else {
            None
        };
        plans.push(SegmentPlan { date, prev_date });
    }
    Ok(plans)
}

pub fn log_segment_skip(date: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Capture,
        "segment.skip",
        obj(&[("date", v_str(date)), ("msg", v_str(reason))]),
    );
}

/// Whether a segment must be rendered even if its output already exists.
pub fn is_fresh(date: &str, end_date: &str) -> bool {
    match (
        NaiveDate::parse_from_str(date, DATE_FORMAT),
        NaiveDate::parse_from_str(end_date, DATE_FORMAT),
    ) {
        (Ok(d), Ok(end)) => d >= end - Duration::days(FRESH_DAYS),
        _ => true,
    }
}

/// Everything a worker needs to render chunks independently.
#[derive(Debug, Clone)]
pub struct CaptureJob {
    pub dataset: Arc<Dataset>,
    pub colors: Option<ColorConfig>,
    pub anim: AnimConfig,
    pub layout: LayoutMetrics,
    pub lang: String,
}

impl CaptureJob {
    fn simulation(&self, segment: &SegmentPlan) -> Simulation {
        let mut sim = Simulation::new(self.anim.clone());
        sim.set_mode(PlaybackMode::Capture);
        sim.set_log_scale(true);
        sim.set_layout(self.layout);
        sim.load(&self.lang, self.dataset.clone(), self.colors.clone(), Some(&segment.date));
        sim
    }
}

/// Render one chunk: seek to its start, then record a frame after each fixed step.
pub fn render_chunk(job: &CaptureJob, segment: &SegmentPlan, chunk: &ChunkPlan) -> Result<Vec<FrameView>> {
    let _scope = ProfileScope::with_context(
        "render_chunk",
        &[("date", v_str(&segment.date)), ("chunk", serde_json::json!(chunk.index))],
    );
    if job.dataset.date_position(&segment.date).is_none() {
        return Err(anyhow!("date {} not in dataset", segment.date));
    }

    let mut sim = job.simulation(segment);
    sim.seek_to_frame(chunk.start, chunk.pre_roll, &segment.anchor());

    let mut frames = Vec::with_capacity(chunk.len());
    for _ in chunk.start..chunk.end {
        sim.step_frame();
        let view = sim
            .frame_view()
            .ok_or_else(|| anyhow!("no frame for {} chunk {}", segment.date, chunk.index))?;
        frames.push(view);
    }
    Ok(frames)
}

pub fn chunk_path(temp_dir: &Path, chunk: &ChunkPlan) -> PathBuf {
    temp_dir.join(format!("chunk_{}.jsonl", chunk.index))
}

pub fn segment_path(out_dir: &Path, date: &str, lang: &str) -> PathBuf {
    out_dir.join(date).join(lang).join(format!("segment_{}.jsonl", date))
}

pub fn final_path(out_dir: &Path, end_date: &str, lang: &str) -> PathBuf {
    out_dir.join(format!("{}_{}.jsonl", end_date, lang))
}

/// One JSON object per line.
pub fn write_frames(path: &Path, frames: &[FrameView]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path).with_context(|| format!("create {}", path.display()))?);
    for frame in frames {
        serde_json::to_writer(&mut out, frame)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

pub fn read_frames(path: &Path) -> Result<Vec<FrameView>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut frames = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        frames.push(serde_json::from_str(&line)?);
    }
    Ok(frames)
}

/// Concatenate JSONL parts in order. Returns lines written.
pub fn concat_jsonl(parts: &[PathBuf], out_path: &Path) -> Result<usize> {
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(out_path)?);
    let mut lines = 0;
    for part in parts {
        let file = File::open(part).with_context(|| format!("open {}", part.display()))?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            out.write_all(line.as_bytes())?;
            out.write_all(b"\n")?;
            lines += 1;
        }
    }
    out.flush()?;
    Ok(lines)
}
