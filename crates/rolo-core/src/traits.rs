//! Core traits for rolodex collaborators.
//!
//! Stores and the completion backend sit behind these traits so the
//! pipeline can run against PostgreSQL and Ollama in production, and
//! against in-memory stores and a deterministic mock in tests.

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::query::{QueryFilter, RawQuerySpec, SortSpec};

// =============================================================================
// STORE TRAITS
// =============================================================================

/// Repository for contact records.
///
/// Every operation is scoped by owner. Reads and writes against an id the
/// owner does not hold behave exactly like a missing id.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// All contacts for an owner, in store order.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ContactRecord>>;

    async fn get(&self, owner_id: &str, id: Uuid) -> Result<Option<ContactRecord>>;

    /// Insert a new contact. Fields must already be normalized and valid.
    async fn create(&self, owner_id: &str, fields: ContactFields) -> Result<ContactRecord>;

    /// Insert several contacts in one transaction.
    async fn create_many(
        &self,
        owner_id: &str,
        fields: Vec<ContactFields>,
    ) -> Result<Vec<ContactRecord>>;

    /// Replace the editable fields of a contact. `last_change` is written
    /// alongside in the same statement.
    async fn update(
        &self,
        owner_id: &str,
        id: Uuid,
        fields: ContactFields,
        last_change: Option<String>,
    ) -> Result<Option<ContactRecord>>;

    /// Attach generated text without touching the editable fields.
    async fn set_generated(
        &self,
        owner_id: &str,
        id: Uuid,
        generated: GeneratedText,
    ) -> Result<bool>;

    /// Permanently delete a contact.
    async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool>;

    /// Conjunctive filter query. The owner condition is applied by the store
    /// before any of `filters`.
    async fn query(
        &self,
        owner_id: &str,
        filters: &[QueryFilter],
        sort: SortSpec,
    ) -> Result<Vec<ContactRecord>>;
}

/// Repository for time-boxed pending reviews.
#[async_trait]
pub trait PendingReviewRepository: Send + Sync {
    /// Write a review in a single statement, expiring `ttl` after creation.
    async fn create(
        &self,
        owner_id: &str,
        transcript: &str,
        payload: ReviewPayload,
        ttl: Duration,
    ) -> Result<PendingReview>;

    /// Fetch a review regardless of expiry; callers decide how to present it.
    async fn get(&self, owner_id: &str, id: Uuid) -> Result<Option<PendingReview>>;

    async fn delete(&self, owner_id: &str, id: Uuid) -> Result<bool>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for text generation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text with a system instruction and a cap on output tokens.
    async fn generate_with_system(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<String>;

    /// Same as [`generate_with_system`](Self::generate_with_system) but asks
    /// the backend for JSON output.
    async fn generate_json_with_system(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        self.generate_with_system(system, prompt, max_tokens).await
    }

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// The narrow extraction interface the pipeline and query engine use.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Fix transcription noise without changing meaning.
    async fn tidy_transcript(&self, raw: &str) -> Result<String>;

    /// Extract exactly one person. Fails when the output has no usable name.
    async fn extract_person(&self, transcript: &str) -> Result<ExtractedFields>;

    /// Extract zero or more people from decoded file text. Bad entries are
    /// dropped; a non-array result fails.
    async fn extract_people(&self, text: &str) -> Result<Vec<ExtractedFields>>;

    /// Translate a question into an unvalidated query spec.
    async fn translate_query(&self, question: &str) -> Result<RawQuerySpec>;

    /// Compose a short answer from formatted result summaries.
    async fn compose_answer(&self, question: &str, context: &str) -> Result<String>;

    /// One informal sentence describing a contact.
    async fn summarize_contact(&self, fields: &ContactFields) -> Result<String>;
}
