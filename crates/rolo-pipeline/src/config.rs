//! Pipeline configuration.

use std::time::Duration;

use tracing::debug;

use rolo_core::defaults;
use rolo_core::timeout::secs_from_env;
use rolo_search::DuplicateConfig;

/// Review lifetime for a day count; out-of-range counts use the default.
fn review_ttl(days: i64) -> chrono::Duration {
    chrono::Duration::try_days(days.clamp(1, defaults::MAX_REVIEW_TTL_DAYS))
        .or_else(|| chrono::Duration::try_days(defaults::REVIEW_TTL_DAYS))
        .unwrap_or_else(|| chrono::Duration::weeks(1))
}

/// Settings shared by the ingestion, review, and import services.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bound on each completion backend call. `None` disables it.
    pub backend_timeout: Option<Duration>,
    /// Bound on each store call. `None` disables it.
    pub store_timeout: Option<Duration>,
    /// Lifetime of a pending review.
    pub review_ttl: chrono::Duration,
    /// Concurrent summary generations after a bulk import.
    pub summary_concurrency: usize,
    pub duplicates: DuplicateConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend_timeout: Some(Duration::from_secs(defaults::BACKEND_TIMEOUT_SECS)),
            store_timeout: Some(Duration::from_secs(defaults::STORE_TIMEOUT_SECS)),
            review_ttl: review_ttl(defaults::REVIEW_TTL_DAYS),
            summary_concurrency: defaults::SUMMARY_CONCURRENCY,
            duplicates: DuplicateConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ROLO_BACKEND_TIMEOUT_SECS` | `90` | Per-call completion bound, `0` disables |
    /// | `ROLO_STORE_TIMEOUT_SECS` | `10` | Per-call store bound, `0` disables |
    /// | `ROLO_REVIEW_TTL_DAYS` | `7` | Pending review lifetime, 1 to 3650 |
    /// | `ROLO_SUMMARY_CONCURRENCY` | `4` | Summary generations in flight after import |
    pub fn from_env() -> Self {
        let review_ttl_days = std::env::var("ROLO_REVIEW_TTL_DAYS")
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|d| (1..=defaults::MAX_REVIEW_TTL_DAYS).contains(d))
            .unwrap_or(defaults::REVIEW_TTL_DAYS);

        let summary_concurrency = std::env::var("ROLO_SUMMARY_CONCURRENCY")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(defaults::SUMMARY_CONCURRENCY)
            .max(1);

        let config = Self {
            backend_timeout: secs_from_env(
                "ROLO_BACKEND_TIMEOUT_SECS",
                defaults::BACKEND_TIMEOUT_SECS,
            ),
            store_timeout: secs_from_env("ROLO_STORE_TIMEOUT_SECS", defaults::STORE_TIMEOUT_SECS),
            review_ttl: review_ttl(review_ttl_days),
            summary_concurrency,
            duplicates: DuplicateConfig::from_env(),
        };
        debug!(
            subsystem = "pipeline",
            backend_timeout_ms = config.backend_timeout.map(|d| d.as_millis() as u64),
            store_timeout_ms = config.store_timeout.map(|d| d.as_millis() as u64),
            review_ttl_days,
            summary_concurrency,
            "Loaded pipeline config"
        );
        config
    }

    pub fn with_backend_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.backend_timeout = timeout;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_review_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.review_ttl = ttl;
        self
    }

    pub fn with_summary_concurrency(mut self, n: usize) -> Self {
        self.summary_concurrency = n.max(1);
        self
    }
}
