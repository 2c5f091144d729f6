use anyhow::{Context, Result};
use attention_race::color::ColorConfig;
use attention_race::config::{env_or, AnimConfig, LayoutMetrics};
use attention_race::data::{history_path, Dataset};
use attention_race::logging::{log, log_frame_summary, obj, v_num, v_str, Domain, Level};
use attention_race::scheduler::{FrameSource, Scheduler, WallClock};
use attention_race::sim::Simulation;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{interval, Duration, Instant};

fn load_colors(path: &Path) -> Option<ColorConfig> {
    match ColorConfig::load(path) {
        Ok(c) => Some(c),
        Err(e) => {
            log(
                Level::Warn,
                Domain::System,
                "color_config_missing",
                obj(&[("path", v_str(&path.display().to_string())), ("msg", v_str(&e.to_string()))]),
            );
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = AnimConfig::from_env();
    let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
    let lang = std::env::var("RACE_LANG").unwrap_or_else(|_| "en".to_string());
    let color_path = std::env::var("COLOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir.join("config.json"));
    let play_seconds: f64 = env_or("PLAY_SECONDS", 10.0);
    let speed: f64 = env_or("SPEED", 1.0);
    let chart_height: f64 = env_or("CHART_HEIGHT", 900.0);
    let start_date = std::env::var("START_DATE").ok();

    let path = history_path(&data_dir, &lang);
    let dataset = Dataset::load(&path).with_context(|| format!("loading {}", path.display()))?;
    let colors = load_colors(&color_path);

    let mut sim = Simulation::new(cfg.clone());
    sim.set_speed(speed);
    sim.set_layout(LayoutMetrics::from_container(chart_height, cfg.bar_count));
    sim.load(&lang, Arc::new(dataset), colors, start_date.as_deref());

    log(
        Level::Info,
        Domain::System,
        "playback_start",
        obj(&[
            ("lang", v_str(&lang)),
            ("fps", v_num(cfg.fps)),
            ("speed", v_num(speed)),
            ("seconds", v_num(play_seconds)),
        ]),
    );

    let period = Duration::from_secs_f64(cfg.frame_dt().max(0.001));
    let summary_every = cfg.fps.round().max(1.0) as u64;
    let deadline = Instant::now() + Duration::from_secs_f64(play_seconds.max(0.0));

    let mut ticker = interval(period);
    let mut source = WallClock::new();
    let mut sched = Scheduler::new();
    sched.play();

    while Instant::now() < deadline {
        ticker.tick().await;
        let Some(dt) = source.next_delta() else {
            break;
        };
        if !sched.tick(&mut sim, dt) {
            continue;
        }
        if sched.frames() % summary_every == 0 {
            if let Some(view) = sim.frame_view() {
                let leaders: Vec<(&str, f64)> = view
                    .bars
                    .iter()
                    .filter(|b| b.opacity >= 1.0)
                    .take(3)
                    .map(|b| (b.title.as_str(), b.value))
                    .collect();
                log_frame_summary(sched.frames(), &view.time_label, &leaders);
            }
        }
    }

    sched.pause();
    log(
        Level::Info,
        Domain::System,
        "playback_stop",
        obj(&[
            ("frames", v_num(sched.frames() as f64)),
            ("digest", v_str(&sim.digest())),
        ]),
    );
    Ok(())
}
