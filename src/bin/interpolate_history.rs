use anyhow::{Context, Result};
use attention_race::curve::rebuild_history;
use attention_race::logging::{log, obj, v_str, Domain, Level};
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let input = PathBuf::from(args.next().unwrap_or_else(|| "data/history_en.json".to_string()));
    let output = args.next().map(PathBuf::from).unwrap_or_else(|| input.clone());

    let text = fs::read_to_string(&input).with_context(|| format!("read {}", input.display()))?;
    let mut history: Value =
        serde_json::from_str(&text).with_context(|| format!("parse {}", input.display()))?;
    let stats = rebuild_history(&mut history)?;

    let body = serde_json::to_string(&history)?;
    fs::write(&output, body).with_context(|| format!("write {}", output.display()))?;

    log(
        Level::Info,
        Domain::Data,
        "history_interpolated",
        obj(&[
            ("path", v_str(&output.display().to_string())),
            ("articles", json!(stats.articles)),
            ("curves", json!(stats.curves)),
            ("pruned", json!(stats.pruned)),
        ]),
    );
    println!(
        "interpolated {} curves for {} articles ({} stale days pruned) -> {}",
        stats.curves,
        stats.articles,
        stats.pruned,
        output.display()
    );
    Ok(())
}
