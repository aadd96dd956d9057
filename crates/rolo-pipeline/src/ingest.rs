//! Voice-note ingestion.
//!
//! `received -> tidied -> extracted -> candidates_searched -> staged`, or
//! `failed` at any step. Tidying is the only step allowed to fail without
//! failing the run; the raw transcript is used instead.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use rolo_core::{
    bounded, Error, ExtractionService, PendingReview, PendingReviewRepository, Result,
    ReviewPayload,
};
use rolo_search::DuplicateFinder;

use crate::config::PipelineConfig;

/// Progress of one ingestion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    Tidied,
    Extracted,
    CandidatesSearched,
    Staged,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Received => "received",
            IngestStage::Tidied => "tidied",
            IngestStage::Extracted => "extracted",
            IngestStage::CandidatesSearched => "candidates_searched",
            IngestStage::Staged => "staged",
        };
        f.write_str(name)
    }
}

/// Turns transcripts into pending reviews.
pub struct IngestionPipeline {
    extractor: Arc<dyn ExtractionService>,
    reviews: Arc<dyn PendingReviewRepository>,
    finder: DuplicateFinder,
    config: PipelineConfig,
}

impl IngestionPipeline {
    pub fn new(
        extractor: Arc<dyn ExtractionService>,
        contacts: Arc<dyn rolo_core::ContactRepository>,
        reviews: Arc<dyn PendingReviewRepository>,
        config: PipelineConfig,
    ) -> Self {
        let mut duplicates = config.duplicates.clone();
        duplicates.store_timeout = config.store_timeout;
        Self {
            extractor,
            reviews,
            finder: DuplicateFinder::with_config(contacts, duplicates),
            config,
        }
    }

    /// Tidy, extract, search for duplicates, and stage a pending review.
    ///
    /// An empty transcript is rejected before any backend call. No review
    /// is written unless every earlier stage succeeded.
    #[instrument(skip(self, raw_transcript), fields(subsystem = "pipeline", component = "ingest", op = "ingest", input_len = raw_transcript.len()))]
    pub async fn ingest(&self, owner_id: &str, raw_transcript: &str) -> Result<PendingReview> {
        let start = Instant::now();
        if raw_transcript.trim().is_empty() {
            return Err(Error::Validation("transcript is empty".to_string()));
        }

        let mut stage = IngestStage::Received;
        let result = self.run_stages(owner_id, raw_transcript, &mut stage).await;
        match &result {
            Ok(review) => info!(
                review_id = %review.id,
                result_count = review.payload.candidates.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Ingestion staged"
            ),
            Err(e) => warn!(
                last_stage = %stage,
                error = %e,
                duration_ms = start.elapsed().as_millis() as u64,
                "Ingestion failed"
            ),
        }
        result
    }

    async fn run_stages(
        &self,
        owner_id: &str,
        raw_transcript: &str,
        stage: &mut IngestStage,
    ) -> Result<PendingReview> {
        let tidied = self.tidy(raw_transcript).await;
        *stage = IngestStage::Tidied;

        let extracted = bounded(
            "extract_person",
            self.config.backend_timeout,
            self.extractor.extract_person(&tidied),
        )
        .await?
        .normalized();
        extracted
            .validate()
            .map_err(|e| Error::extraction("extract_person", e.to_string()))?;
        *stage = IngestStage::Extracted;
        debug!(name = %extracted.name, "Extracted person");

        let candidates = self.finder.find_candidates(owner_id, &extracted.name).await?;
        *stage = IngestStage::CandidatesSearched;

        let payload = ReviewPayload {
            extracted,
            tidied_transcript: tidied,
            candidates,
        };
        let review = bounded(
            "create_review",
            self.config.store_timeout,
            self.reviews
                .create(owner_id, raw_transcript, payload, self.config.review_ttl),
        )
        .await?;
        *stage = IngestStage::Staged;
        Ok(review)
    }

    /// Tidy the transcript, falling back to the raw text on any failure.
    async fn tidy(&self, raw_transcript: &str) -> String {
        match bounded(
            "tidy_transcript",
            self.config.backend_timeout,
            self.extractor.tidy_transcript(raw_transcript),
        )
        .await
        {
            Ok(tidied) if !tidied.trim().is_empty() => tidied.trim().to_string(),
            Ok(_) => {
                warn!("Tidy returned empty text, using raw transcript");
                raw_transcript.trim().to_string()
            }
            Err(e) => {
                warn!(error = %e, "Tidy failed, using raw transcript");
                raw_transcript.trim().to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use rolo_core::{ContactFields, ContactRepository};
    use rolo_db::{MemoryContactStore, MemoryReviewStore};
    use rolo_inference::mock::MockGenerationBackend;
    use rolo_inference::{prompts, LlmExtractor};

    const SARAH_JSON: &str = r#"{"name":"Sarah Chen","company":"Stripe","role":"product manager","personalDetails":"loves rock climbing"}"#;

    struct Harness {
        backend: MockGenerationBackend,
        contacts: Arc<MemoryContactStore>,
        reviews: Arc<MemoryReviewStore>,
        pipeline: IngestionPipeline,
    }

    fn harness(backend: MockGenerationBackend, config: PipelineConfig) -> Harness {
        let contacts = Arc::new(MemoryContactStore::new());
        let reviews = Arc::new(MemoryReviewStore::new());
        let extractor = Arc::new(LlmExtractor::new(Arc::new(backend.clone())));
        let pipeline =
            IngestionPipeline::new(extractor, contacts.clone(), reviews.clone(), config);
        Harness {
            backend,
            contacts,
            reviews,
            pipeline,
        }
    }

    fn sarah_backend() -> MockGenerationBackend {
        MockGenerationBackend::new()
            .with_system_response(
                prompts::TIDY_SYSTEM,
                "Met Sarah Chen, PM at Stripe, loves rock climbing.",
            )
            .with_system_response(prompts::EXTRACT_PERSON_SYSTEM, SARAH_JSON)
    }

    #[tokio::test]
    async fn test_empty_transcript_rejected_without_backend_call() {
        let h = harness(sarah_backend(), PipelineConfig::default());
        let err = h.pipeline.ingest("user_a", "   \n ").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(h.backend.call_count(), 0);
        assert!(h.reviews.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_stages_review() {
        let h = harness(sarah_backend(), PipelineConfig::default());
        let review = h
            .pipeline
            .ingest("user_a", "Met Sarah Chen, PM at Stripe, loves rock climbing")
            .await
            .unwrap();

        assert_eq!(review.payload.extracted.name, "Sarah Chen");
        assert_eq!(
            review.payload.tidied_transcript,
            "Met Sarah Chen, PM at Stripe, loves rock climbing."
        );
        assert!(review.payload.candidates.is_empty());
        assert_eq!(review.expires_at - review.created_at, chrono::Duration::days(7));
        assert_eq!(h.reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_tidy_failure_falls_back_to_raw() {
        let backend = MockGenerationBackend::new()
            .with_system_failure(prompts::TIDY_SYSTEM, "backend down")
            .with_system_response(prompts::EXTRACT_PERSON_SYSTEM, SARAH_JSON);
        let h = harness(backend, PipelineConfig::default());

        let raw = "um met sarah chen uh pm at stripe";
        let review = h.pipeline.ingest("user_a", raw).await.unwrap();
        assert_eq!(review.payload.tidied_transcript, raw);

        let extract_call = h
            .backend
            .get_calls()
            .into_iter()
            .find(|c| c.system == prompts::EXTRACT_PERSON_SYSTEM)
            .unwrap();
        assert!(extract_call.prompt.contains(raw));
    }

    #[tokio::test]
    async fn test_extraction_failure_stages_nothing() {
        let backend = MockGenerationBackend::new()
            .with_system_response(prompts::TIDY_SYSTEM, "Met someone.")
            .with_system_response(prompts::EXTRACT_PERSON_SYSTEM, "not json at all");
        let h = harness(backend, PipelineConfig::default());

        let err = h.pipeline.ingest("user_a", "Met someone").await.unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
        assert!(h.reviews.is_empty());
    }

    #[tokio::test]
    async fn test_candidates_found_for_existing_contacts() {
        let h = harness(sarah_backend(), PipelineConfig::default());
        for name in ["Sarah Chen", "Sara Chen", "Bob Lee"] {
            h.contacts
                .create("user_a", ContactFields::named(name))
                .await
                .unwrap();
        }
        h.contacts
            .create("user_b", ContactFields::named("Sarah Chen"))
            .await
            .unwrap();

        let review = h.pipeline.ingest("user_a", "Met Sarah Chen").await.unwrap();
        let names: Vec<_> = review
            .payload
            .candidates
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["Sarah Chen", "Sara Chen"]);
    }

    #[tokio::test]
    async fn test_store_failure_during_candidate_search_fails_ingest() {
        let h = harness(sarah_backend(), PipelineConfig::default());
        h.contacts.set_failing(true);
        let err = h.pipeline.ingest("user_a", "Met Sarah Chen").await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
        assert!(h.reviews.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tidy_timeout_falls_back_to_raw_transcript() {
        let backend = sarah_backend().with_system_latency_ms(prompts::TIDY_SYSTEM, 5_000);
        let config = PipelineConfig::default().with_backend_timeout(Some(Duration::from_secs(1)));
        let h = harness(backend, config);

        let raw = "  Met Sarah Chen  ";
        let review = h.pipeline.ingest("user_a", raw).await.unwrap();

        assert_eq!(review.payload.tidied_transcript, raw.trim());
        assert_eq!(review.payload.extracted.name, "Sarah Chen");
        assert_eq!(h.backend.calls_with_system(prompts::TIDY_SYSTEM), 1);
        assert_eq!(h.reviews.len(), 1);

        let extract_call = h
            .backend
            .get_calls()
            .into_iter()
            .find(|c| c.system == prompts::EXTRACT_PERSON_SYSTEM)
            .unwrap();
        assert!(extract_call.prompt.contains("Met Sarah Chen"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out_extraction_and_stages_nothing() {
        let backend = sarah_backend().with_latency_ms(5_000);
        let config = PipelineConfig::default().with_backend_timeout(Some(Duration::from_secs(1)));
        let h = harness(backend, config);

        let err = h.pipeline.ingest("user_a", "Met Sarah Chen").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout {
                operation: "extract_person",
                ..
            }
        ));
        // Tidy timed out first and was skipped.
        assert_eq!(h.backend.calls_with_system(prompts::TIDY_SYSTEM), 1);
        assert!(h.reviews.is_empty());
    }
}
