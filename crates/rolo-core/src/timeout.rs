//! Optional time bounds for external calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Run `fut`, failing with [`Error::Timeout`] if it outlives `limit`.
/// `None` means unbounded.
pub async fn bounded<T, F>(operation: &'static str, limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        None => fut.await,
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    subsystem = "timeout",
                    op = operation,
                    after_ms = limit.as_millis() as u64,
                    "External call timed out"
                );
                Err(Error::Timeout {
                    operation,
                    after_ms: limit.as_millis() as u64,
                })
            }
        },
    }
}

/// Read a seconds value from the environment, falling back to `default`.
/// A value of `0` disables the bound.
pub fn secs_from_env(var: &str, default: u64) -> Option<Duration> {
    let secs = std::env::var(var)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default);
    (secs > 0).then(|| Duration::from_secs(secs))
}
