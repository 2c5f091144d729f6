use attention_race::data::{analyze_history, default_manifest_path};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    let path = PathBuf::from(
        env::args()
            .nth(1)
            .unwrap_or_else(|| "data/history_en.json".to_string()),
    );
    let strict = env::var("MANIFEST_STRICT").map(|v| v == "1").unwrap_or(false);

    let now_ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let manifest = match analyze_history(&path, now_ts) {
        Ok(m) => m,
        Err(err) => {
            eprintln!("analysis failed: {:#}", err);
            std::process::exit(1);
        }
    };

    let out_path = default_manifest_path(&path);
    let text = match serde_json::to_string_pretty(&manifest) {
        Ok(t) => t,
        Err(err) => {
            eprintln!("failed to encode manifest: {}", err);
            std::process::exit(2);
        }
    };
    if let Err(err) = fs::write(&out_path, text) {
        eprintln!("failed to write {}: {}", out_path.display(), err);
        std::process::exit(3);
    }
    println!(
        "wrote manifest {} dates={} articles={} warnings={}",
        out_path.display(),
        manifest.date_count,
        manifest.article_count,
        manifest.warnings.len()
    );
    for w in &manifest.warnings {
        eprintln!("  warning: {}", w);
    }
    if strict && !manifest.ok() {
        std::process::exit(4);
    }
}
