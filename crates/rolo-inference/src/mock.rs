//! Deterministic generation backend for tests.
//!
//! Responses are keyed by system instruction, so one mock can stand in
//! for every adapter operation at once:
//!
//! ```rust,ignore
//! let backend = MockGenerationBackend::new()
//!     .with_system_response(prompts::TIDY_SYSTEM, "Met Sarah Chen at the climbing gym.")
//!     .with_system_failure(prompts::SUMMARY_SYSTEM, "model offline");
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use rolo_core::{Error, GenerationBackend, Result};

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Fail(String),
}

#[derive(Debug, Clone)]
struct MockConfig {
    replies: HashMap<String, MockReply>,
    default_response: String,
    latency_ms: u64,
    system_latency_ms: HashMap<String, u64>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            replies: HashMap::new(),
            default_response: "Mock response".to_string(),
            latency_ms: 0,
            system_latency_ms: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
    pub json: bool,
    pub max_tokens: Option<u32>,
}

/// Mock [`GenerationBackend`] with a shared call log.
#[derive(Clone)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Reply used when no system instruction matches.
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    pub fn with_system_response(
        mut self,
        system: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .replies
            .insert(system.into(), MockReply::Text(response.into()));
        self
    }

    /// Fail every call made with this system instruction.
    pub fn with_system_failure(
        mut self,
        system: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .replies
            .insert(system.into(), MockReply::Fail(message.into()));
        self
    }

    /// Simulated latency for every call.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Simulated latency for calls with this system instruction only.
    /// Overrides [`with_latency_ms`](Self::with_latency_ms) for that instruction.
    pub fn with_system_latency_ms(mut self, system: impl Into<String>, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config)
            .system_latency_ms
            .insert(system.into(), latency_ms);
        self
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    /// Number of calls made with the given system instruction.
    pub fn calls_with_system(&self, system: &str) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.system == system)
            .count()
    }

    async fn reply(
        &self,
        system: &str,
        prompt: &str,
        json: bool,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        self.call_log.lock().unwrap().push(MockCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
            json,
            max_tokens,
        });

        let latency_ms = self
            .config
            .system_latency_ms
            .get(system)
            .copied()
            .unwrap_or(self.config.latency_ms);
        if latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(latency_ms)).await;
        }

        match self.config.replies.get(system) {
            Some(MockReply::Text(text)) => Ok(text.clone()),
            Some(MockReply::Fail(message)) => Err(Error::Inference(message.clone())),
            None => Ok(self.config.default_response.clone()),
        }
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate_with_system(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        self.reply(system, prompt, false, max_tokens).await
    }

    async fn generate_json_with_system(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        self.reply(system, prompt, true, max_tokens).await
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
