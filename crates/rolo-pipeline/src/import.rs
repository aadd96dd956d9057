//! Bulk import from decoded file text.
//!
//! Extraction and creation are separate steps so the caller can preview
//! and edit the extracted entries before anything is written.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{info, instrument};

use rolo_core::defaults::{BATCH_IMPORT_MAX, MAX_IMPORT_TEXT_BYTES};
use rolo_core::{
    bounded, ContactFields, ContactRecord, ContactRepository, Error, ExtractedFields,
    ExtractionService, Result,
};

use crate::config::PipelineConfig;
use crate::summaries::SummaryWriter;

/// Contacts created by an import.
#[derive(Debug)]
pub struct ImportOutcome {
    pub created: Vec<ContactRecord>,
    /// Detached summary generation for the created contacts.
    pub summary_task: JoinHandle<usize>,
}

pub struct ImportService {
    extractor: Arc<dyn ExtractionService>,
    contacts: Arc<dyn ContactRepository>,
    summaries: SummaryWriter,
    config: PipelineConfig,
}

impl ImportService {
    pub fn new(
        extractor: Arc<dyn ExtractionService>,
        contacts: Arc<dyn ContactRepository>,
        config: PipelineConfig,
    ) -> Self {
        let summaries = SummaryWriter::new(
            extractor.clone(),
            contacts.clone(),
            config.backend_timeout,
            config.store_timeout,
        );
        Self {
            extractor,
            contacts,
            summaries,
            config,
        }
    }

    /// Extract contacts from already-decoded text. Nothing is stored.
    #[instrument(skip(self, text), fields(subsystem = "pipeline", component = "import", op = "extract_from_text", input_len = text.len()))]
    pub async fn extract_from_text(&self, text: &str) -> Result<Vec<ExtractedFields>> {
        if text.trim().is_empty() {
            return Err(Error::Validation("import text is empty".to_string()));
        }
        if text.len() > MAX_IMPORT_TEXT_BYTES {
            return Err(Error::Validation(format!(
                "import text is {} bytes, maximum is {}",
                text.len(),
                MAX_IMPORT_TEXT_BYTES
            )));
        }

        let start = Instant::now();
        let people = bounded(
            "extract_people",
            self.config.backend_timeout,
            self.extractor.extract_people(text),
        )
        .await?;
        let people: Vec<ExtractedFields> = people
            .into_iter()
            .map(ContactFields::normalized)
            .filter(|p| !p.name.is_empty())
            .collect();
        info!(
            result_count = people.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Import extraction complete"
        );
        Ok(people)
    }

    /// Create every contact in one batch, then summarize them in the
    /// background. Any entry without a name rejects the whole batch.
    #[instrument(skip(self, contacts), fields(subsystem = "pipeline", component = "import", op = "import", batch = contacts.len()))]
    pub async fn import(&self, owner_id: &str, contacts: Vec<ContactFields>) -> Result<ImportOutcome> {
        if contacts.is_empty() {
            return Err(Error::Validation("no contacts to import".to_string()));
        }
        if contacts.len() > BATCH_IMPORT_MAX {
            return Err(Error::Validation(format!(
                "{} contacts in batch, maximum is {}",
                contacts.len(),
                BATCH_IMPORT_MAX
            )));
        }

        let contacts: Vec<ContactFields> =
            contacts.into_iter().map(ContactFields::normalized).collect();
        let missing = contacts.iter().filter(|c| c.name.is_empty()).count();
        if missing > 0 {
            return Err(Error::Validation(format!(
                "{} contact(s) are missing a name",
                missing
            )));
        }
        for contact in &contacts {
            contact.validate()?;
        }

        let created = bounded(
            "create_contacts",
            self.config.store_timeout,
            self.contacts.create_many(owner_id, contacts),
        )
        .await?;
        info!(result_count = created.len(), "Contacts imported");

        let summary_task = self
            .summaries
            .spawn(created.clone(), self.config.summary_concurrency);
        Ok(ImportOutcome {
            created,
            summary_task,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolo_db::MemoryContactStore;
    use rolo_inference::mock::MockGenerationBackend;
    use rolo_inference::{prompts, LlmExtractor};

    fn service(backend: MockGenerationBackend) -> (Arc<MemoryContactStore>, ImportService) {
        let contacts = Arc::new(MemoryContactStore::new());
        let service = ImportService::new(
            Arc::new(LlmExtractor::new(Arc::new(backend))),
            contacts.clone(),
            PipelineConfig::default(),
        );
        (contacts, service)
    }

    #[tokio::test]
    async fn test_extract_from_text_keeps_named_entries() {
        let backend = MockGenerationBackend::new().with_system_response(
            prompts::EXTRACT_PEOPLE_SYSTEM,
            r#"[{"name":"Ana Lima","company":"Acme"},{"company":"Ghost"},{"name":"Ben Ode"}]"#,
        );
        let (_, service) = service(backend);
        let people = service
            .extract_from_text("name,company\nAna Lima,Acme\n,Ghost\nBen Ode,")
            .await
            .unwrap();
        assert_eq!(people.len(), 2);
        assert_eq!(people[0].company.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn test_extract_from_text_size_cap() {
        let backend = MockGenerationBackend::new();
        let (_, service) = service(backend.clone());
        let text = "a".repeat(MAX_IMPORT_TEXT_BYTES + 1);
        let err = service.extract_from_text(&text).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_import_rejects_batch_with_missing_name() {
        let (contacts, service) = service(MockGenerationBackend::new());
        let err = service
            .import(
                "user_a",
                vec![ContactFields::named("Ana"), ContactFields::named("  ")],
            )
            .await
            .unwrap_err();
        match err {
            Error::Validation(msg) => assert!(msg.contains("1 contact(s)")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(contacts.list_by_owner("user_a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_batch_cap() {
        let (_, service) = service(MockGenerationBackend::new());
        let batch = (0..=BATCH_IMPORT_MAX)
            .map(|i| ContactFields::named(format!("Person {}", i)))
            .collect();
        assert!(matches!(
            service.import("user_a", batch).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_import_creates_and_summarizes() {
        let backend = MockGenerationBackend::new()
            .with_system_response(prompts::SUMMARY_SYSTEM, "Someone from the import.");
        let (contacts, service) = service(backend);

        let outcome = service
            .import(
                "user_a",
                vec![ContactFields::named(" Ana "), ContactFields::named("Ben")],
            )
            .await
            .unwrap();
        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.created[0].name, "Ana");

        assert_eq!(outcome.summary_task.await.unwrap(), 2);
        let stored = contacts.list_by_owner("user_a").await.unwrap();
        assert!(stored
            .iter()
            .all(|c| c.ai_summary.as_deref() == Some("Someone from the import.")));
    }

    #[tokio::test]
    async fn test_summary_failures_do_not_fail_import() {
        let backend = MockGenerationBackend::new()
            .with_system_failure(prompts::SUMMARY_SYSTEM, "model offline");
        let (contacts, service) = service(backend);

        let outcome = service
            .import("user_a", vec![ContactFields::named("Ana")])
            .await
            .unwrap();
        assert_eq!(outcome.summary_task.await.unwrap(), 0);
        assert_eq!(contacts.list_by_owner("user_a").await.unwrap().len(), 1);
    }
}
