//! Best-effort contact summary generation.
//!
//! Runs after the primary write has returned. Failures are logged and
//! never reach the caller of the operation that scheduled them.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rolo_core::{
    bounded, ContactRecord, ContactRepository, ExtractionService, GeneratedText, Result,
};

/// Generates and stores one-sentence summaries for contacts.
#[derive(Clone)]
pub struct SummaryWriter {
    extractor: Arc<dyn ExtractionService>,
    contacts: Arc<dyn ContactRepository>,
    backend_timeout: Option<Duration>,
    store_timeout: Option<Duration>,
}

impl SummaryWriter {
    pub fn new(
        extractor: Arc<dyn ExtractionService>,
        contacts: Arc<dyn ContactRepository>,
        backend_timeout: Option<Duration>,
        store_timeout: Option<Duration>,
    ) -> Self {
        Self {
            extractor,
            contacts,
            backend_timeout,
            store_timeout,
        }
    }

    async fn try_summarize(&self, contact: &ContactRecord) -> Result<bool> {
        let summary = bounded(
            "summarize_contact",
            self.backend_timeout,
            self.extractor.summarize_contact(&contact.fields()),
        )
        .await?;
        bounded(
            "set_generated",
            self.store_timeout,
            self.contacts.set_generated(
                &contact.owner_id,
                contact.id,
                GeneratedText {
                    ai_summary: Some(summary),
                    last_change: None,
                },
            ),
        )
        .await
    }

    /// Summarize one contact. Returns whether a summary was stored.
    pub async fn summarize(&self, contact: &ContactRecord) -> bool {
        match self.try_summarize(contact).await {
            Ok(stored) => {
                if !stored {
                    debug!(contact_id = %contact.id, "Contact gone before summary was stored");
                }
                stored
            }
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "summaries",
                    contact_id = %contact.id,
                    error = %e,
                    "Summary generation failed"
                );
                false
            }
        }
    }

    /// Summarize contacts on a detached task with at most `concurrency`
    /// generations in flight. The handle resolves to the number stored.
    pub fn spawn(&self, contacts: Vec<ContactRecord>, concurrency: usize) -> JoinHandle<usize> {
        let writer = self.clone();
        tokio::spawn(async move {
            let total = contacts.len();
            let stored = stream::iter(contacts)
                .map(|contact| {
                    let writer = writer.clone();
                    async move { writer.summarize(&contact).await }
                })
                .buffer_unordered(concurrency.max(1))
                .filter(|ok| futures::future::ready(*ok))
                .count()
                .await;
            info!(
                subsystem = "pipeline",
                component = "summaries",
                total,
                result_count = stored,
                "Summary generation finished"
            );
            stored
        })
    }
}
