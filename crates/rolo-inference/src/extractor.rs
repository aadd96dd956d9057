//! Extraction service backed by a text-completion backend.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use rolo_core::defaults::{
    ANSWER_MAX_TOKENS, EXTRACT_MANY_MAX_TOKENS, EXTRACT_MAX_TOKENS, SUMMARY_MAX_TOKENS,
    TIDY_MAX_TOKENS, TRANSLATE_MAX_TOKENS,
};
use rolo_core::{
    ContactFields, Error, ExtractedFields, ExtractionService, GenerationBackend, RawQuerySpec,
    Result,
};

use crate::parse::{fields_from_value, parse_json, query_spec_from_value, strip_code_fences};
use crate::prompts;

/// Backend failures surface as `ExtractionFailed` naming the operation;
/// timeouts keep their own variant.
fn backend_error(operation: &'static str, err: Error) -> Error {
    match err {
        Error::Timeout { .. } | Error::ExtractionFailed { .. } => err,
        other => Error::extraction(operation, other.to_string()),
    }
}

/// [`ExtractionService`] over any [`GenerationBackend`].
pub struct LlmExtractor {
    backend: Arc<dyn GenerationBackend>,
    translate_system: String,
}

impl LlmExtractor {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            translate_system: prompts::translate_system(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    async fn text_call(
        &self,
        operation: &'static str,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let start = Instant::now();
        let text = self
            .backend
            .generate_with_system(system, prompt, Some(max_tokens))
            .await
            .map_err(|e| backend_error(operation, e))?;
        debug!(
            op = operation,
            response_len = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Backend call complete"
        );
        Ok(text)
    }

    async fn json_call(
        &self,
        operation: &'static str,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<serde_json::Value> {
        let start = Instant::now();
        let text = self
            .backend
            .generate_json_with_system(system, prompt, Some(max_tokens))
            .await
            .map_err(|e| backend_error(operation, e))?;
        debug!(
            op = operation,
            response_len = text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Backend call complete"
        );
        parse_json(&text).map_err(|reason| Error::extraction(operation, reason))
    }
}

#[async_trait]
impl ExtractionService for LlmExtractor {
    #[instrument(skip(self, raw), fields(subsystem = "inference", component = "extractor", op = "tidy_transcript", input_len = raw.len()))]
    async fn tidy_transcript(&self, raw: &str) -> Result<String> {
        let text = self
            .text_call(
                "tidy_transcript",
                prompts::TIDY_SYSTEM,
                &prompts::tidy_prompt(raw),
                TIDY_MAX_TOKENS,
            )
            .await?;
        let tidied = strip_code_fences(&text);
        if tidied.is_empty() {
            return Err(Error::extraction("tidy_transcript", "empty response"));
        }
        Ok(tidied)
    }

    #[instrument(skip(self, transcript), fields(subsystem = "inference", component = "extractor", op = "extract_person", input_len = transcript.len()))]
    async fn extract_person(&self, transcript: &str) -> Result<ExtractedFields> {
        let value = self
            .json_call(
                "extract_person",
                prompts::EXTRACT_PERSON_SYSTEM,
                &prompts::extract_person_prompt(transcript),
                EXTRACT_MAX_TOKENS,
            )
            .await?;
        if !value.is_object() {
            return Err(Error::extraction(
                "extract_person",
                "expected a JSON object",
            ));
        }
        fields_from_value(&value)
            .ok_or_else(|| Error::extraction("extract_person", "no person name in output"))
    }

    #[instrument(skip(self, text), fields(subsystem = "inference", component = "extractor", op = "extract_people", input_len = text.len()))]
    async fn extract_people(&self, text: &str) -> Result<Vec<ExtractedFields>> {
        let value = self
            .json_call(
                "extract_people",
                prompts::EXTRACT_PEOPLE_SYSTEM,
                &prompts::extract_people_prompt(text),
                EXTRACT_MANY_MAX_TOKENS,
            )
            .await?;
        let entries = value.as_array().ok_or_else(|| {
            Error::extraction("extract_people", "response was not an array of contacts")
        })?;

        let people: Vec<ExtractedFields> = entries
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| {
                let fields = fields_from_value(entry);
                if fields.is_none() {
                    warn!(index = idx, "Dropping extracted entry without a name");
                }
                fields
            })
            .collect();

        info!(
            entries = entries.len(),
            result_count = people.len(),
            "Batch extraction complete"
        );
        Ok(people)
    }

    #[instrument(skip(self), fields(subsystem = "inference", component = "extractor", op = "translate_query"))]
    async fn translate_query(&self, question: &str) -> Result<RawQuerySpec> {
        let value = self
            .json_call(
                "translate_query",
                &self.translate_system,
                question,
                TRANSLATE_MAX_TOKENS,
            )
            .await?;
        query_spec_from_value(&value)
            .ok_or_else(|| Error::extraction("translate_query", "expected a JSON object"))
    }

    #[instrument(skip(self, context), fields(subsystem = "inference", component = "extractor", op = "compose_answer"))]
    async fn compose_answer(&self, question: &str, context: &str) -> Result<String> {
        let text = self
            .text_call(
                "compose_answer",
                prompts::ANSWER_SYSTEM,
                &prompts::answer_prompt(question, context),
                ANSWER_MAX_TOKENS,
            )
            .await?;
        Ok(text.trim().to_string())
    }

    #[instrument(skip(self, fields), fields(subsystem = "inference", component = "extractor", op = "summarize_contact"))]
    async fn summarize_contact(&self, fields: &ContactFields) -> Result<String> {
        let text = self
            .text_call(
                "summarize_contact",
                prompts::SUMMARY_SYSTEM,
                &prompts::summary_prompt(fields),
                SUMMARY_MAX_TOKENS,
            )
            .await?;
        let summary = text.trim().trim_matches('"').trim().to_string();
        if summary.is_empty() {
            return Err(Error::extraction("summarize_contact", "empty response"));
        }
        Ok(summary)
    }
}
