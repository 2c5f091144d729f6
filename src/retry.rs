use anyhow::{anyhow, Result};
use rand::Rng;
use serde_json::json;
use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::logging::{log, obj, v_str, Domain, Level};

/// Backoff policy for re-running failed capture work.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Total tries, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 4000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Exponential backoff clamped to `max_delay_ms`, then ±`jitter_factor`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64 * 2.0_f64.powi(attempt.min(30) as i32);
        let clamped = base.min(self.max_delay_ms as f64);

        let jitter_range = clamped * self.jitter_factor.clamp(0.0, 1.0);
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        Duration::from_millis((clamped + jitter).max(0.0) as u64)
    }
}

/// Run `operation` until it succeeds or `max_attempts` is spent.
///
/// The closure receives the 1-based attempt number.
pub async fn retry_async<F, Fut, T>(config: &RetryConfig, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.max_attempts.max(1);
    let mut last_error: Option<anyhow::Error> = None;

    for attempt in 1..=attempts {
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let retrying = attempt < attempts;
                let delay = if retrying {
                    config.delay_for_attempt(attempt - 1)
                } else {
                    Duration::ZERO
                };
                log(
                    if retrying { Level::Warn } else { Level::Error },
                    Domain::Capture,
                    "retry",
                    obj(&[
                        ("msg", v_str(&format!("{} attempt {}/{} failed", label, attempt, attempts))),
                        ("label", v_str(label)),
                        ("attempt", json!(attempt)),
                        ("error", v_str(&e.to_string())),
                        ("delay_ms", json!(delay.as_millis() as u64)),
                    ]),
                );
                if retrying {
                    sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("{}: no attempts made", label)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn delay_doubles_then_clamps() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 1000,
            jitter_factor: 0.0,
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(1000));
    }

    #[test]
    fn jitter_stays_in_range() {
        let config = RetryConfig {
            jitter_factor: 0.5,
            ..RetryConfig::default()
        };
        for _ in 0..50 {
            let ms = config.delay_for_attempt(0).as_millis();
            assert!((125..=375).contains(&ms), "ms={}", ms);
        }
    }

    #[tokio::test]
    async fn first_success_returns_immediately() {
        let result: Result<u32> = retry_async(&fast(3), "chunk", |attempt| async move { Ok(attempt) }).await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn succeeds_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let result: Result<&str> = retry_async(&fast(3), "chunk", move |_| {
            let c = seen.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(anyhow!("not yet"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_with_last_error() {
        let result: Result<()> =
            retry_async(&fast(2), "chunk", |attempt| async move { Err(anyhow!("boom {}", attempt)) }).await;
        assert_eq!(result.unwrap_err().to_string(), "boom 2");
    }
}
