//! Pending review resolution.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use rolo_core::{
    bounded, ContactRecord, ContactRepository, Disposition, Error, ExtractedFields,
    ExtractionService, PendingReview, PendingReviewRepository, Result, ReviewState,
};

use crate::config::PipelineConfig;
use crate::reconcile::{describe_change, resolve, MergeTarget};
use crate::summaries::SummaryWriter;

/// Origin recorded in the change description of a merge.
pub const MERGE_ORIGIN: &str = "Merged from voice note";

/// Result of confirming a review.
#[derive(Debug)]
pub struct Confirmation {
    pub contact: ContactRecord,
    /// True when the review was merged into an existing contact.
    pub merged: bool,
    /// Detached summary generation; dropping the handle does not cancel it.
    pub summary_task: JoinHandle<usize>,
}

/// Shows, confirms, and discards pending reviews.
pub struct ReviewService {
    contacts: Arc<dyn ContactRepository>,
    reviews: Arc<dyn PendingReviewRepository>,
    summaries: SummaryWriter,
    config: PipelineConfig,
}

impl ReviewService {
    pub fn new(
        extractor: Arc<dyn ExtractionService>,
        contacts: Arc<dyn ContactRepository>,
        reviews: Arc<dyn PendingReviewRepository>,
        config: PipelineConfig,
    ) -> Self {
        let summaries = SummaryWriter::new(
            extractor,
            contacts.clone(),
            config.backend_timeout,
            config.store_timeout,
        );
        Self {
            contacts,
            reviews,
            summaries,
            config,
        }
    }

    async fn fetch(&self, owner_id: &str, id: Uuid) -> Result<PendingReview> {
        bounded(
            "get_review",
            self.config.store_timeout,
            self.reviews.get(owner_id, id),
        )
        .await?
        .ok_or(Error::ReviewNotFound(id))
    }

    /// Present a review. Expired reviews come back as
    /// [`ReviewState::Expired`], missing ones as [`Error::ReviewNotFound`].
    #[instrument(skip(self), fields(subsystem = "pipeline", component = "review", op = "open"))]
    pub async fn open(&self, owner_id: &str, id: Uuid) -> Result<ReviewState> {
        let review = self.fetch(owner_id, id).await?;
        let state = ReviewState::from_review(review, Utc::now());
        debug!(expired = state.is_expired(), "Review opened");
        Ok(state)
    }

    /// Resolve a review into a contact.
    ///
    /// `corrections` replaces the extracted fields when the user edited them.
    /// The review is deleted afterwards on a best-effort basis.
    #[instrument(skip(self, corrections), fields(subsystem = "pipeline", component = "review", op = "confirm", review_id = %id))]
    pub async fn confirm(
        &self,
        owner_id: &str,
        id: Uuid,
        disposition: Disposition,
        corrections: Option<ExtractedFields>,
    ) -> Result<Confirmation> {
        let review = match self.open(owner_id, id).await? {
            ReviewState::Active(review) => review,
            ReviewState::Expired { id, expired_at } => {
                return Err(Error::ReviewExpired { id, expired_at })
            }
        };

        let extracted = corrections.unwrap_or(review.payload.extracted).normalized();
        extracted.validate()?;

        let (contact, merged) = match disposition {
            Disposition::AsNew => {
                let resolution = resolve(MergeTarget::New, extracted);
                let contact = bounded(
                    "create_contact",
                    self.config.store_timeout,
                    self.contacts.create(owner_id, resolution.fields),
                )
                .await?;
                (contact, false)
            }
            Disposition::MergeInto(contact_id) => {
                (self.merge(owner_id, contact_id, extracted).await?, true)
            }
        };

        self.delete_review_best_effort(owner_id, id).await;

        info!(
            contact_id = %contact.id,
            merged,
            "Review confirmed"
        );
        let summary_task = self.summaries.spawn(vec![contact.clone()], 1);
        Ok(Confirmation {
            contact,
            merged,
            summary_task,
        })
    }

    async fn merge(
        &self,
        owner_id: &str,
        contact_id: Uuid,
        extracted: ExtractedFields,
    ) -> Result<ContactRecord> {
        let existing = bounded(
            "get_contact",
            self.config.store_timeout,
            self.contacts.get(owner_id, contact_id),
        )
        .await?
        .ok_or(Error::ContactNotFound(contact_id))?;

        let resolution = resolve(MergeTarget::Existing(&existing), extracted);
        if resolution.is_unchanged() {
            debug!(contact_id = %contact_id, "Merge added nothing new");
            return Ok(existing);
        }

        bounded(
            "update_contact",
            self.config.store_timeout,
            self.contacts.update(
                owner_id,
                contact_id,
                resolution.fields,
                describe_change(MERGE_ORIGIN, &resolution.changed),
            ),
        )
        .await?
        .ok_or(Error::ContactNotFound(contact_id))
    }

    async fn delete_review_best_effort(&self, owner_id: &str, id: Uuid) {
        match bounded(
            "delete_review",
            self.config.store_timeout,
            self.reviews.delete(owner_id, id),
        )
        .await
        {
            Ok(true) => {}
            Ok(false) => debug!(review_id = %id, "Review already gone"),
            Err(e) => warn!(review_id = %id, error = %e, "Failed to delete resolved review"),
        }
    }

    /// Drop a review without creating anything. Returns whether it existed.
    #[instrument(skip(self), fields(subsystem = "pipeline", component = "review", op = "discard"))]
    pub async fn discard(&self, owner_id: &str, id: Uuid) -> Result<bool> {
        bounded(
            "delete_review",
            self.config.store_timeout,
            self.reviews.delete(owner_id, id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rolo_core::{ContactFields, ReviewPayload};
    use rolo_db::{MemoryContactStore, MemoryReviewStore};
    use rolo_inference::mock::MockGenerationBackend;
    use rolo_inference::{prompts, LlmExtractor};

    struct Harness {
        contacts: Arc<MemoryContactStore>,
        reviews: Arc<MemoryReviewStore>,
        service: ReviewService,
    }

    fn harness() -> Harness {
        let backend = MockGenerationBackend::new()
            .with_system_response(prompts::SUMMARY_SYSTEM, "Stripe PM who climbs.");
        let contacts = Arc::new(MemoryContactStore::new());
        let reviews = Arc::new(MemoryReviewStore::new());
        let service = ReviewService::new(
            Arc::new(LlmExtractor::new(Arc::new(backend))),
            contacts.clone(),
            reviews.clone(),
            PipelineConfig::default(),
        );
        Harness {
            contacts,
            reviews,
            service,
        }
    }

    async fn stage(h: &Harness, owner: &str, extracted: ExtractedFields) -> PendingReview {
        h.reviews
            .create(
                owner,
                "raw transcript",
                ReviewPayload {
                    extracted,
                    tidied_transcript: "tidied".to_string(),
                    candidates: vec![],
                },
                Duration::days(7),
            )
            .await
            .unwrap()
    }

    fn sarah() -> ExtractedFields {
        ExtractedFields {
            company: Some("Stripe".to_string()),
            notes: Some("Wants intro to Priya".to_string()),
            ..ExtractedFields::named("Sarah Chen")
        }
    }

    #[tokio::test]
    async fn test_confirm_as_new_creates_contact_and_deletes_review() {
        let h = harness();
        let review = stage(&h, "user_a", sarah()).await;

        let confirmed = h
            .service
            .confirm("user_a", review.id, Disposition::AsNew, None)
            .await
            .unwrap();
        assert!(!confirmed.merged);
        assert_eq!(confirmed.contact.name, "Sarah Chen");
        assert_eq!(confirmed.contact.company.as_deref(), Some("Stripe"));
        assert!(h.reviews.is_empty());

        assert_eq!(confirmed.summary_task.await.unwrap(), 1);
        let stored = h.contacts.get("user_a", confirmed.contact.id).await.unwrap().unwrap();
        assert_eq!(stored.ai_summary.as_deref(), Some("Stripe PM who climbs."));
    }

    #[tokio::test]
    async fn test_confirm_merge_fills_gaps_and_records_change() {
        let h = harness();
        let existing = h
            .contacts
            .create(
                "user_a",
                ContactFields {
                    company: Some("Globex".to_string()),
                    ..ContactFields::named("Sara Chen")
                },
            )
            .await
            .unwrap();
        let review = stage(&h, "user_a", sarah()).await;

        let confirmed = h
            .service
            .confirm("user_a", review.id, Disposition::MergeInto(existing.id), None)
            .await
            .unwrap();
        assert!(confirmed.merged);
        assert_eq!(confirmed.contact.id, existing.id);
        assert_eq!(confirmed.contact.name, "Sara Chen");
        assert_eq!(confirmed.contact.company.as_deref(), Some("Globex"));
        assert_eq!(confirmed.contact.notes.as_deref(), Some("Wants intro to Priya"));
        assert_eq!(
            confirmed.contact.last_change.as_deref(),
            Some("Merged from voice note: added notes")
        );
        assert!(confirmed.contact.updated_at > existing.updated_at);
    }

    #[tokio::test]
    async fn test_confirm_with_corrections() {
        let h = harness();
        let review = stage(&h, "user_a", sarah()).await;
        let corrected = ExtractedFields {
            role: Some("product manager".to_string()),
            ..ExtractedFields::named("Sarah Chen-Lee")
        };

        let confirmed = h
            .service
            .confirm("user_a", review.id, Disposition::AsNew, Some(corrected))
            .await
            .unwrap();
        assert_eq!(confirmed.contact.name, "Sarah Chen-Lee");
        assert_eq!(confirmed.contact.company, None);
        assert_eq!(confirmed.contact.role.as_deref(), Some("product manager"));
    }

    #[tokio::test]
    async fn test_corrections_are_validated() {
        let h = harness();
        let review = stage(&h, "user_a", sarah()).await;
        let bad = ExtractedFields {
            birthday_month: Some(13),
            ..ExtractedFields::named("Sarah Chen")
        };
        let err = h
            .service
            .confirm("user_a", review.id, Disposition::AsNew, Some(bad))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(h.reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_review_is_presented_and_blocked() {
        let h = harness();
        let now = Utc::now();
        let review = PendingReview {
            id: Uuid::now_v7(),
            owner_id: "user_a".to_string(),
            transcript: "Met Sam".to_string(),
            payload: ReviewPayload {
                extracted: ExtractedFields::named("Sam"),
                tidied_transcript: "Met Sam".to_string(),
                candidates: vec![],
            },
            created_at: now - Duration::days(8),
            expires_at: now - Duration::days(1),
        };
        h.reviews.insert_review(review.clone()).unwrap();

        let state = h.service.open("user_a", review.id).await.unwrap();
        assert_eq!(
            state,
            ReviewState::Expired {
                id: review.id,
                expired_at: review.expires_at
            }
        );

        let err = h
            .service
            .confirm("user_a", review.id, Disposition::AsNew, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReviewExpired { .. }));
        assert!(h.contacts.list_by_owner("user_a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_owner_sees_not_found() {
        let h = harness();
        let review = stage(&h, "user_a", sarah()).await;

        let err = h.service.open("user_b", review.id).await.unwrap_err();
        assert!(matches!(err, Error::ReviewNotFound(_)));
        let err = h
            .service
            .confirm("user_b", review.id, Disposition::AsNew, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReviewNotFound(_)));
        assert!(!h.service.discard("user_b", review.id).await.unwrap());
        assert_eq!(h.reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_merge_into_other_owners_contact_is_not_found() {
        let h = harness();
        let foreign = h
            .contacts
            .create("user_b", ContactFields::named("Sarah Chen"))
            .await
            .unwrap();
        let review = stage(&h, "user_a", sarah()).await;

        let err = h
            .service
            .confirm("user_a", review.id, Disposition::MergeInto(foreign.id), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ContactNotFound(_)));
        let foreign_after = h.contacts.get("user_b", foreign.id).await.unwrap().unwrap();
        assert_eq!(foreign_after.notes, None);
    }

    #[tokio::test]
    async fn test_failed_review_delete_keeps_merge() {
        let h = harness();
        let review = stage(&h, "user_a", sarah()).await;
        h.reviews.set_failing_delete(true);

        let confirmed = h
            .service
            .confirm("user_a", review.id, Disposition::AsNew, None)
            .await
            .unwrap();
        assert_eq!(confirmed.contact.name, "Sarah Chen");
        assert_eq!(h.reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_discard() {
        let h = harness();
        let review = stage(&h, "user_a", sarah()).await;
        assert!(h.service.discard("user_a", review.id).await.unwrap());
        assert!(h.reviews.is_empty());
        assert!(matches!(
            h.service.open("user_a", review.id).await,
            Err(Error::ReviewNotFound(_))
        ));
    }
}
