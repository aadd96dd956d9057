//! Natural-language contact queries.
//!
//! A question is translated by the extraction service into a raw query spec,
//! validated against the declared field list, and run against the contact
//! store with the owner scope applied by the store itself. Filters naming
//! anything outside the declared fields are dropped, not failed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use rolo_core::defaults::ANSWER_RESULT_LIMIT;
use rolo_core::{
    bounded, ContactRecord, ContactRepository, Error, ExtractionService, QueryFilter, QuerySpec,
    RawQuerySpec, Result, SortSpec,
};

/// Summary used when the translation does not provide one.
pub const DEFAULT_QUERY_SUMMARY: &str = "Contacts matching your query";

/// Fallback when the backend returns an empty answer.
pub const EMPTY_ANSWER: &str = "Sorry, I couldn't generate an answer.";

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Contacts matching a question plus the translated summary.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub results: Vec<ContactRecord>,
    pub summary: String,
}

/// Response text when nothing matched.
pub fn no_match_message(question: &str) -> String {
    format!(
        "I searched your contacts but couldn't find anyone matching: \"{}\"",
        question
    )
}

/// Validate a raw translation. Undeclared fields, unknown operators and
/// values of the wrong type are dropped; an undeclared sort field falls back
/// to the default order.
pub fn validate_spec(raw: RawQuerySpec) -> QuerySpec {
    let mut filters = Vec::with_capacity(raw.filters.len());
    let mut dropped = Vec::new();
    for entry in &raw.filters {
        match QueryFilter::from_raw(entry) {
            Some(filter) => filters.push(filter),
            None => {
                warn!(
                    subsystem = "search",
                    component = "nl_query",
                    field = %entry.field,
                    op = %entry.op,
                    "Dropping filter outside declared fields or operators"
                );
                dropped.push(format!("{} {}", entry.field, entry.op));
            }
        }
    }

    let sort = raw.sort.as_ref().and_then(|s| {
        let parsed = SortSpec::from_raw(s);
        if parsed.is_none() {
            warn!(
                subsystem = "search",
                component = "nl_query",
                field = %s.field,
                "Ignoring sort on undeclared field"
            );
        }
        parsed
    });

    let summary = raw
        .summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_QUERY_SUMMARY.to_string());

    QuerySpec {
        filters,
        sort,
        summary,
        dropped,
    }
}

/// One line of compact, comma-separated fields for the answer context.
pub fn format_contact_summary(contact: &ContactRecord) -> String {
    let mut parts = vec![format!("Name: {}", contact.name)];
    let mut push = |label: &str, value: &Option<String>| {
        if let Some(v) = value {
            parts.push(format!("{}: {}", label, v));
        }
    };
    push("Company", &contact.company);
    push("Role", &contact.role);
    push("Email", &contact.email);
    push("Phone", &contact.phone);
    push("Details", &contact.personal_details);
    push("Notes", &contact.notes);
    push("Met via", &contact.source);
    if let (Some(month), Some(day)) = (contact.birthday_month, contact.birthday_day) {
        if let Some(name) = usize::try_from(month - 1)
            .ok()
            .and_then(|i| MONTH_ABBREVIATIONS.get(i))
        {
            parts.push(format!("Birthday: {} {}", name, day));
        }
    }
    if let Some(children) = &contact.children {
        parts.push(format!("Children: {}", children));
    }
    parts.join(", ")
}

/// Context handed to the answer call: the summary, the result count, up to
/// `limit` formatted contacts, and a truncation note when needed.
pub fn build_answer_context(summary: &str, results: &[ContactRecord], limit: usize) -> String {
    let summaries: Vec<String> = results
        .iter()
        .take(limit)
        .map(format_contact_summary)
        .collect();
    let mut context = format!(
        "Query summary: {}\n\nFound {} contact(s):\n{}",
        summary,
        results.len(),
        summaries.join("\n---\n")
    );
    if results.len() > limit {
        context.push_str(&format!(
            "\n\n(showing first {} of {} results)",
            limit,
            results.len()
        ));
    }
    context
}

/// Translates, executes, and answers free-text questions about contacts.
pub struct NlQueryEngine {
    extractor: Arc<dyn ExtractionService>,
    contacts: Arc<dyn ContactRepository>,
    backend_timeout: Option<Duration>,
    store_timeout: Option<Duration>,
    answer_limit: usize,
}

impl NlQueryEngine {
    pub fn new(extractor: Arc<dyn ExtractionService>, contacts: Arc<dyn ContactRepository>) -> Self {
        Self {
            extractor,
            contacts,
            backend_timeout: None,
            store_timeout: None,
            answer_limit: ANSWER_RESULT_LIMIT,
        }
    }

    /// Bound backend and store calls.
    pub fn with_timeouts(mut self, backend: Option<Duration>, store: Option<Duration>) -> Self {
        self.backend_timeout = backend;
        self.store_timeout = store;
        self
    }

    /// Translate a question into a validated spec.
    ///
    /// Any backend failure, timeout, or malformed output becomes
    /// [`Error::QueryNotUnderstood`].
    #[instrument(skip(self), fields(subsystem = "search", component = "nl_query", op = "translate"))]
    pub async fn translate(&self, question: &str) -> Result<QuerySpec> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::Validation("question is empty".to_string()));
        }

        let raw = bounded(
            "translate_query",
            self.backend_timeout,
            self.extractor.translate_query(question),
        )
        .await
        .map_err(|e| {
            warn!(error = %e, "Query translation failed");
            match e {
                Error::Validation(_) | Error::StoreUnavailable(_) => e,
                other => Error::QueryNotUnderstood(other.to_string()),
            }
        })?;

        let spec = validate_spec(raw);
        debug!(
            filters = spec.filters.len(),
            dropped = spec.dropped.len(),
            sort = ?spec.sort,
            "Query translated"
        );
        Ok(spec)
    }

    /// Run a validated spec for one owner.
    pub async fn run(&self, owner_id: &str, spec: &QuerySpec) -> Result<Vec<ContactRecord>> {
        bounded(
            "query_contacts",
            self.store_timeout,
            self.contacts
                .query(owner_id, &spec.filters, spec.effective_sort()),
        )
        .await
    }

    /// Translate and execute a question for one owner.
    #[instrument(skip(self), fields(subsystem = "search", component = "nl_query", op = "execute"))]
    pub async fn execute(&self, owner_id: &str, question: &str) -> Result<QueryResult> {
        let start = Instant::now();
        let spec = self.translate(question).await?;
        let results = self.run(owner_id, &spec).await?;
        info!(
            result_count = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Query executed"
        );
        Ok(QueryResult {
            results,
            summary: spec.summary,
        })
    }

    /// Answer a question in prose. Zero results short-circuit to a fixed
    /// message; a failed answer call is returned as an error.
    #[instrument(skip(self), fields(subsystem = "search", component = "nl_query", op = "answer"))]
    pub async fn answer(&self, owner_id: &str, question: &str) -> Result<String> {
        let QueryResult { results, summary } = self.execute(owner_id, question).await?;
        if results.is_empty() {
            return Ok(no_match_message(question.trim()));
        }

        let context = build_answer_context(&summary, &results, self.answer_limit);
        let answer = bounded(
            "compose_answer",
            self.backend_timeout,
            self.extractor.compose_answer(question.trim(), &context),
        )
        .await?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(EMPTY_ANSWER.to_string());
        }
        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rolo_core::{ContactFields, ExtractedFields, FieldKind, RawFilter, RawSort};
    use rolo_db::memory::MemoryContactStore;
    use serde_json::json;
    use std::sync::Mutex;

    /// Extraction stub returning a fixed translation and recording answers.
    struct StubExtractor {
        translation: Mutex<Option<Result<RawQuerySpec>>>,
        answer: Mutex<Option<Result<String>>>,
        contexts: Mutex<Vec<String>>,
    }

    impl StubExtractor {
        fn translating(spec: RawQuerySpec) -> Self {
            Self {
                translation: Mutex::new(Some(Ok(spec))),
                answer: Mutex::new(Some(Ok("Two people work there.".to_string()))),
                contexts: Mutex::new(Vec::new()),
            }
        }

        fn failing_answer(self) -> Self {
            *self.answer.lock().unwrap() = Some(Err(Error::extraction("compose_answer", "503")));
            self
        }
    }

    #[async_trait]
    impl ExtractionService for StubExtractor {
        async fn tidy_transcript(&self, raw: &str) -> Result<String> {
            Ok(raw.to_string())
        }
        async fn extract_person(&self, _: &str) -> Result<ExtractedFields> {
            unreachable!()
        }
        async fn extract_people(&self, _: &str) -> Result<Vec<ExtractedFields>> {
            unreachable!()
        }
        async fn translate_query(&self, _: &str) -> Result<RawQuerySpec> {
            self.translation
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(Error::extraction("translate_query", "exhausted")))
        }
        async fn compose_answer(&self, _: &str, context: &str) -> Result<String> {
            self.contexts.lock().unwrap().push(context.to_string());
            self.answer
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(String::new()))
        }
        async fn summarize_contact(&self, _: &ContactFields) -> Result<String> {
            unreachable!()
        }
    }

    fn filter(field: &str, op: &str, value: Option<serde_json::Value>) -> RawFilter {
        RawFilter {
            field: field.to_string(),
            op: op.to_string(),
            value,
        }
    }

    fn spec(filters: Vec<RawFilter>) -> RawQuerySpec {
        RawQuerySpec {
            filters,
            sort: None,
            summary: Some("People at Acme".to_string()),
        }
    }

    async fn seeded() -> Arc<MemoryContactStore> {
        let store = Arc::new(MemoryContactStore::new());
        for (owner, name, company) in [
            ("owner_a", "Ana Ruiz", Some("Acme")),
            ("owner_a", "Ben Ode", Some("Acme Labs")),
            ("owner_a", "Cy Tan", None),
            ("owner_b", "Dee Vo", Some("Acme")),
        ] {
            let mut fields = ContactFields::named(name);
            fields.company = company.map(String::from);
            store.create(owner, fields).await.unwrap();
        }
        store
    }

    #[test]
    fn test_validate_drops_undeclared_field() {
        let validated = validate_spec(spec(vec![
            filter("ssn", "eq", Some(json!("123-45-6789"))),
            filter("company", "ilike", Some(json!("%Acme%"))),
        ]));
        assert_eq!(validated.filters.len(), 1);
        assert_eq!(validated.filters[0].field.kind(), FieldKind::Text);
        assert_eq!(validated.dropped, vec!["ssn eq".to_string()]);
    }

    #[test]
    fn test_validate_defaults() {
        let validated = validate_spec(RawQuerySpec {
            filters: vec![],
            sort: Some(RawSort {
                field: "salary".into(),
                direction: Some("asc".into()),
            }),
            summary: Some("   ".into()),
        });
        assert_eq!(validated.sort, None);
        assert_eq!(validated.effective_sort(), SortSpec::default());
        assert_eq!(validated.summary, DEFAULT_QUERY_SUMMARY);
    }

    #[test]
    fn test_format_contact_summary() {
        let now = chrono::Utc::now();
        let contact = ContactRecord {
            id: uuid::Uuid::new_v4(),
            owner_id: "o".into(),
            name: "Ana Ruiz".into(),
            company: Some("Acme".into()),
            role: None,
            email: None,
            phone: None,
            personal_details: Some("two dogs".into()),
            notes: None,
            source: Some("PyCon".into()),
            birthday_month: Some(3),
            birthday_day: Some(14),
            children: None,
            ai_summary: None,
            last_change: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(
            format_contact_summary(&contact),
            "Name: Ana Ruiz, Company: Acme, Details: two dogs, Met via: PyCon, Birthday: Mar 14"
        );
    }

    #[tokio::test]
    async fn test_execute_drops_bad_filter_and_keeps_running() {
        let store = seeded().await;
        let extractor = Arc::new(StubExtractor::translating(spec(vec![
            filter("ssn", "eq", Some(json!("x"))),
            filter("company", "ilike", Some(json!("acme"))),
        ])));
        let engine = NlQueryEngine::new(extractor, store);

        let result = engine.execute("owner_a", "who works at acme").await.unwrap();
        let mut names: Vec<_> = result.results.iter().map(|c| c.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["Ana Ruiz", "Ben Ode"]);
        assert_eq!(result.summary, "People at Acme");
    }

    #[tokio::test]
    async fn test_owner_scope_cannot_be_removed() {
        let store = seeded().await;
        let extractor = Arc::new(StubExtractor::translating(spec(vec![
            filter("ownerId", "isNotNull", None),
            filter("owner_id", "eq", Some(json!("owner_b"))),
        ])));
        let engine = NlQueryEngine::new(extractor, store);

        let result = engine.execute("owner_a", "show all contacts").await.unwrap();
        assert_eq!(result.results.len(), 3);
        assert!(result.results.iter().all(|c| c.owner_id == "owner_a"));
    }

    #[tokio::test]
    async fn test_translation_failure_asks_to_rephrase() {
        let store = seeded().await;
        let extractor = Arc::new(StubExtractor {
            translation: Mutex::new(Some(Err(Error::extraction("translate_query", "prose")))),
            answer: Mutex::new(None),
            contexts: Mutex::new(Vec::new()),
        });
        let engine = NlQueryEngine::new(extractor, store);
        let err = engine.execute("owner_a", "???").await.unwrap_err();
        assert!(matches!(err, Error::QueryNotUnderstood(_)));
    }

    #[tokio::test]
    async fn test_empty_question_is_validation_error() {
        let store = seeded().await;
        let extractor = Arc::new(StubExtractor::translating(RawQuerySpec::default()));
        let engine = NlQueryEngine::new(extractor, store);
        let err = engine.execute("owner_a", "   ").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_answer_no_matches() {
        let store = seeded().await;
        let extractor = Arc::new(StubExtractor::translating(spec(vec![filter(
            "company",
            "eq",
            Some(json!("Globex")),
        )])));
        let engine = NlQueryEngine::new(extractor.clone(), store);
        let answer = engine.answer("owner_a", "who is at Globex?").await.unwrap();
        assert_eq!(
            answer,
            "I searched your contacts but couldn't find anyone matching: \"who is at Globex?\""
        );
        assert!(extractor.contexts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_answer_uses_backend_text() {
        let store = seeded().await;
        let extractor = Arc::new(StubExtractor::translating(spec(vec![filter(
            "company",
            "ilike",
            Some(json!("%Acme%")),
        )])));
        let engine = NlQueryEngine::new(extractor.clone(), store);
        let answer = engine.answer("owner_a", "who works at Acme?").await.unwrap();
        assert_eq!(answer, "Two people work there.");

        let contexts = extractor.contexts.lock().unwrap();
        assert!(contexts[0].contains("Found 2 contact(s)"));
        assert!(contexts[0].contains("\n---\n"));
        assert!(!contexts[0].contains("Dee Vo"));
    }

    #[tokio::test]
    async fn test_answer_failure_is_not_no_matches() {
        let store = seeded().await;
        let extractor = Arc::new(
            StubExtractor::translating(spec(vec![filter(
                "company",
                "ilike",
                Some(json!("Acme")),
            )]))
            .failing_answer(),
        );
        let engine = NlQueryEngine::new(extractor, store);
        let err = engine.answer("owner_a", "who works at Acme?").await.unwrap_err();
        assert!(err.is_backend_failure());
    }

    #[test]
    fn test_answer_context_truncation_note() {
        let now = chrono::Utc::now();
        let rows: Vec<ContactRecord> = (0..25)
            .map(|i| ContactRecord {
                id: uuid::Uuid::new_v4(),
                owner_id: "o".into(),
                name: format!("Person {}", i),
                company: None,
                role: None,
                email: None,
                phone: None,
                personal_details: None,
                notes: None,
                source: None,
                birthday_month: None,
                birthday_day: None,
                children: None,
                ai_summary: None,
                last_change: None,
                created_at: now,
                updated_at: now,
            })
            .collect();
        let context = build_answer_context("Everyone", &rows, 20);
        assert!(context.ends_with("(showing first 20 of 25 results)"));
        assert!(context.contains("Person 19"));
        assert!(!context.contains("Person 20"));
    }
}
