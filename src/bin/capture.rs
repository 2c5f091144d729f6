use anyhow::{anyhow, Context, Result};
use attention_race::capture::{
    chunk_path, concat_jsonl, final_path, is_fresh, log_segment_skip, plan_chunks, plan_segments,
    render_chunk, segment_path, write_frames, CaptureJob, ChunkPlan, SegmentPlan,
};
use attention_race::color::ColorConfig;
use attention_race::config::{AnimConfig, CaptureConfig, LayoutMetrics};
use attention_race::data::{history_path, Dataset};
use attention_race::logging::{log, log_chunk, obj, v_num, v_str, Domain, Level};
use attention_race::retry::{retry_async, RetryConfig};
use futures_util::future::join_all;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

async fn render_chunk_file(
    job: CaptureJob,
    segment: SegmentPlan,
    chunk: ChunkPlan,
    path: PathBuf,
    retry: RetryConfig,
) -> Result<usize> {
    let label = format!("{} chunk {}", segment.date, chunk.index);
    retry_async(&retry, &label, |attempt| {
        let job = job.clone();
        let segment = segment.clone();
        let path = path.clone();
        async move {
            let date = segment.date.clone();
            let outcome = tokio::task::spawn_blocking(move || -> Result<usize> {
                let frames = render_chunk(&job, &segment, &chunk)?;
                write_frames(&path, &frames)?;
                Ok(frames.len())
            })
            .await
            .map_err(|e| anyhow!("chunk worker panicked: {}", e))
            .and_then(|r| r);
            let status = if outcome.is_ok() { "ok" } else { "failed" };
            log_chunk(&date, chunk.index, status, attempt);
            outcome
        }
    })
    .await
}

/// Render one day as parallel chunks and merge them into the segment file.
async fn render_segment(
    job: &CaptureJob,
    cfg: &CaptureConfig,
    segment: &SegmentPlan,
    out_dir: &Path,
) -> Result<PathBuf> {
    let started = Instant::now();
    let temp_dir = out_dir.join("temp").join(format!("{}_{}", segment.date, job.lang));
    std::fs::create_dir_all(&temp_dir)?;

    let chunks = plan_chunks(job.anim.frames_per_day(), cfg.workers, cfg.pre_roll_factor);
    let retry = RetryConfig::with_attempts(cfg.max_attempts);
    let paths: Vec<PathBuf> = chunks.iter().map(|c| chunk_path(&temp_dir, c)).collect();

    let tasks = chunks.iter().zip(&paths).map(|(chunk, path)| {
        render_chunk_file(job.clone(), segment.clone(), *chunk, path.clone(), retry.clone())
    });
    let results = join_all(tasks).await;
    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        return Err(anyhow!(
            "{} of {} chunks failed for {} after {} attempts",
            failed,
            chunks.len(),
            segment.date,
            retry.max_attempts
        ));
    }

    let seg_path = segment_path(out_dir, &segment.date, &job.lang);
    let frames = concat_jsonl(&paths, &seg_path)?;
    if let Err(e) = std::fs::remove_dir_all(&temp_dir) {
        log(
            Level::Warn,
            Domain::Capture,
            "temp_cleanup_failed",
            obj(&[("path", v_str(&temp_dir.display().to_string())), ("msg", v_str(&e.to_string()))]),
        );
    }
    log(
        Level::Info,
        Domain::Capture,
        "segment_rendered",
        obj(&[
            ("date", v_str(&segment.date)),
            ("frames", json!(frames)),
            ("chunks", json!(chunks.len())),
            ("elapsed_ms", v_num(started.elapsed().as_secs_f64() * 1000.0)),
        ]),
    );
    Ok(seg_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let end_date = args
        .next()
        .ok_or_else(|| anyhow!("usage: capture <end_date> [lang]"))?;
    let lang = args
        .next()
        .or_else(|| std::env::var("RACE_LANG").ok())
        .unwrap_or_else(|| "en".to_string());

    let anim = AnimConfig::from_env();
    let mut cfg = CaptureConfig::from_env();
    cfg.workers = cfg.workers.min(num_cpus::get().max(1));
    let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
    let out_dir = PathBuf::from(&cfg.out_dir);

    let path = history_path(&data_dir, &lang);
    let dataset = Dataset::load(&path).with_context(|| format!("loading {}", path.display()))?;
    if dataset.is_empty() {
        return Err(anyhow!("no history data in {}", path.display()));
    }
    let colors = ColorConfig::load(&data_dir.join("config.json")).ok();
    let segments = plan_segments(dataset.dates(), &end_date, cfg.days)?;

    let job = CaptureJob {
        layout: LayoutMetrics::from_container(cfg.chart_height, anim.bar_count),
        dataset: Arc::new(dataset),
        colors,
        anim,
        lang: lang.clone(),
    };

    log(
        Level::Info,
        Domain::Capture,
        "capture_start",
        obj(&[
            ("lang", v_str(&lang)),
            ("end_date", v_str(&end_date)),
            ("segments", json!(segments.len())),
            ("workers", json!(cfg.workers)),
        ]),
    );

    let mut segment_files = Vec::new();
    for segment in &segments {
        let existing = segment_path(&out_dir, &segment.date, &lang);
        if existing.exists() && !is_fresh(&segment.date, &end_date) {
            log(
                Level::Info,
                Domain::Capture,
                "segment_cached",
                obj(&[("date", v_str(&segment.date))]),
            );
            segment_files.push(existing);
            continue;
        }
        if segment.missing_pre_roll(job.dataset.dates()) {
            log_segment_skip(&segment.date, "no pre-roll data for previous date");
            continue;
        }
        match render_segment(&job, &cfg, segment, &out_dir).await {
            Ok(p) => segment_files.push(p),
            Err(e) => log(
                Level::Error,
                Domain::Capture,
                "segment_failed",
                obj(&[("date", v_str(&segment.date)), ("msg", v_str(&format!("{:#}", e)))]),
            ),
        }
    }

    if segment_files.is_empty() {
        return Err(anyhow!("no segments rendered for {}", end_date));
    }
    let final_file = final_path(&out_dir, &end_date, &lang);
    let frames = concat_jsonl(&segment_files, &final_file)?;
    println!(
        "wrote {} frames from {} segments -> {}",
        frames,
        segment_files.len(),
        final_file.display()
    );
    Ok(())
}
