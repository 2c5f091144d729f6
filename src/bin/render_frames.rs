use anyhow::{anyhow, Context, Result};
use attention_race::capture::{render_chunk, write_frames, CaptureJob, ChunkPlan, SegmentPlan};
use attention_race::color::ColorConfig;
use attention_race::config::{env_or, AnimConfig, LayoutMetrics};
use attention_race::data::{history_path, Dataset};
use std::path::PathBuf;
use std::sync::Arc;

/// Render a frame range of one day to JSONL.
///
/// usage: render_frames <date> [start_frame] [frames] [out]
fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let date = args.next().ok_or_else(|| anyhow!("usage: render_frames <date> [start] [frames] [out]"))?;
    let start: i64 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(0);
    let count: i64 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(60);
    let out = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("frames_{}_{}.jsonl", date, start)));

    let anim = AnimConfig::from_env();
    let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
    let lang = std::env::var("RACE_LANG").unwrap_or_else(|_| "en".to_string());
    let pre_roll: i64 = env_or("PRE_ROLL_FRAMES", anim.pre_run_minutes.round() as i64);
    let chart_height: f64 = env_or("CHART_HEIGHT", 900.0);

    let path = history_path(&data_dir, &lang);
    let dataset = Dataset::load(&path).with_context(|| format!("loading {}", path.display()))?;
    let position = dataset
        .date_position(&date)
        .ok_or_else(|| anyhow!("date {} not in {}", date, path.display()))?;
    let prev_date = position
        .checked_sub(1)
        .and_then(|p| dataset.dates().get(p).cloned());
    let colors = ColorConfig::load(&data_dir.join("config.json")).ok();

    let job = CaptureJob {
        layout: LayoutMetrics::from_container(chart_height, anim.bar_count),
        dataset: Arc::new(dataset),
        colors,
        anim,
        lang,
    };
    let segment = SegmentPlan { date, prev_date };
    let chunk = ChunkPlan {
        index: 0,
        start,
        end: start + count.max(0),
        pre_roll,
    };
    let frames = render_chunk(&job, &segment, &chunk)?;
    write_frames(&out, &frames)?;
    println!("wrote {} frames -> {}", frames.len(), out.display());
    Ok(())
}
