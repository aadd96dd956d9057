//! Duplicate candidate search over an owner's contacts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument};

use rolo_core::defaults::{DUPLICATE_LIMIT, DUPLICATE_THRESHOLD};
use rolo_core::{bounded, ContactRecord, ContactRepository, DuplicateCandidate, Result};

use crate::similarity::name_similarity;

/// Thresholds for duplicate detection.
#[derive(Debug, Clone)]
pub struct DuplicateConfig {
    /// Minimum name similarity to report, inclusive.
    pub threshold: f64,
    /// Maximum candidates returned.
    pub limit: usize,
    /// Bound on the contact list read.
    pub store_timeout: Option<Duration>,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            threshold: DUPLICATE_THRESHOLD,
            limit: DUPLICATE_LIMIT,
            store_timeout: None,
        }
    }
}

impl DuplicateConfig {
    /// Create from environment variables.
    pub fn from_env() -> Self {
        let threshold = std::env::var("ROLO_DUPLICATE_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| (0.0..=1.0).contains(v))
            .unwrap_or(DUPLICATE_THRESHOLD);
        let limit = std::env::var("ROLO_DUPLICATE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DUPLICATE_LIMIT);
        Self {
            threshold,
            limit,
            store_timeout: rolo_core::timeout::secs_from_env(
                "ROLO_STORE_TIMEOUT_SECS",
                rolo_core::defaults::STORE_TIMEOUT_SECS,
            ),
        }
    }
}

/// Score contacts against a name and keep the closest matches.
///
/// Pure over the given slice: results are ordered by score descending, ties
/// keep input order, and scores are rounded to two decimals before ranking.
pub fn rank_candidates(
    name: &str,
    contacts: &[ContactRecord],
    threshold: f64,
    limit: usize,
) -> Vec<DuplicateCandidate> {
    let mut matches: Vec<DuplicateCandidate> = contacts
        .iter()
        .filter_map(|contact| {
            let score = name_similarity(name, &contact.name);
            (score >= threshold).then(|| DuplicateCandidate {
                contact_id: contact.id,
                name: contact.name.clone(),
                company: contact.company.clone(),
                role: contact.role.clone(),
                similarity: (score * 100.0).round() / 100.0,
            })
        })
        .collect();

    // sort_by is stable
    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(limit);
    matches
}

/// Finds existing contacts that may be the same person as a new name.
pub struct DuplicateFinder {
    contacts: Arc<dyn ContactRepository>,
    config: DuplicateConfig,
}

impl DuplicateFinder {
    pub fn new(contacts: Arc<dyn ContactRepository>) -> Self {
        Self::with_config(contacts, DuplicateConfig::default())
    }

    pub fn with_config(contacts: Arc<dyn ContactRepository>, config: DuplicateConfig) -> Self {
        Self { contacts, config }
    }

    pub fn config(&self) -> &DuplicateConfig {
        &self.config
    }

    /// Full scan of the owner's contacts. A failed read is an error, never
    /// an empty result.
    #[instrument(skip(self), fields(subsystem = "search", component = "duplicates"))]
    pub async fn find_candidates(
        &self,
        owner_id: &str,
        name: &str,
    ) -> Result<Vec<DuplicateCandidate>> {
        let start = Instant::now();
        let contacts = bounded(
            "list_contacts",
            self.config.store_timeout,
            self.contacts.list_by_owner(owner_id),
        )
        .await?;

        let candidates = rank_candidates(name, &contacts, self.config.threshold, self.config.limit);
        debug!(
            scanned = contacts.len(),
            result_count = candidates.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Duplicate search complete"
        );
        Ok(candidates)
    }
}
