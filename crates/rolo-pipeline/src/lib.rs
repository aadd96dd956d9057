//! # rolo-pipeline
//!
//! From voice notes and files to contact records.
//!
//! This crate provides:
//! - Ingestion of transcripts into time-boxed pending reviews
//! - Review confirmation with field-level merge into existing contacts
//! - Bulk import from decoded file text
//! - Direct edits, weekly digests, and CSV export
//! - The `rolo` operator CLI
//!
//! ## Example
//!
//! ```ignore
//! use rolo_pipeline::Rolodex;
//!
//! let rolodex = Rolodex::new(extractor, contacts, reviews, PipelineConfig::from_env());
//! let review = rolodex.ingest.ingest("user_1", "Met Sarah Chen, PM at Stripe").await?;
//! let confirmed = rolodex
//!     .reviews
//!     .confirm("user_1", review.id, Disposition::AsNew, None)
//!     .await?;
//! ```

pub mod config;
pub mod contacts;
pub mod digest;
pub mod export;
pub mod import;
pub mod ingest;
pub mod reconcile;
pub mod review;
pub mod summaries;

use std::sync::Arc;

use rolo_core::{ContactRepository, ExtractionService, PendingReviewRepository, Result};
use rolo_search::NlQueryEngine;

pub use config::PipelineConfig;
pub use contacts::{changed_fields, ContactService};
pub use digest::{month_name, upcoming_birthdays, DigestService, WeeklyDigest};
pub use export::{csv_record, export_csv, render_csv, CSV_HEADERS};
pub use import::{ImportOutcome, ImportService};
pub use ingest::{IngestStage, IngestionPipeline};
pub use reconcile::{describe_change, resolve, MergeTarget, Resolution};
pub use review::{Confirmation, ReviewService, MERGE_ORIGIN};
pub use summaries::SummaryWriter;

/// Every service wired to the same stores and extractor.
pub struct Rolodex {
    pub ingest: IngestionPipeline,
    pub reviews: ReviewService,
    pub import: ImportService,
    pub contacts: ContactService,
    pub digest: DigestService,
    pub query: NlQueryEngine,
    contact_store: Arc<dyn ContactRepository>,
    config: PipelineConfig,
}

impl Rolodex {
    pub fn new(
        extractor: Arc<dyn ExtractionService>,
        contacts: Arc<dyn ContactRepository>,
        reviews: Arc<dyn PendingReviewRepository>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            ingest: IngestionPipeline::new(
                extractor.clone(),
                contacts.clone(),
                reviews.clone(),
                config.clone(),
            ),
            reviews: ReviewService::new(
                extractor.clone(),
                contacts.clone(),
                reviews,
                config.clone(),
            ),
            import: ImportService::new(extractor.clone(), contacts.clone(), config.clone()),
            contacts: ContactService::new(contacts.clone(), config.clone()),
            digest: DigestService::new(contacts.clone(), config.clone()),
            query: NlQueryEngine::new(extractor, contacts.clone())
                .with_timeouts(config.backend_timeout, config.store_timeout),
            contact_store: contacts,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// CSV of every contact the owner holds.
    pub async fn export_csv(&self, owner_id: &str) -> Result<String> {
        export::export_csv(&self.contact_store, &self.config, owner_id).await
    }
}
