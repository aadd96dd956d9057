//! Ollama generation backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use rolo_core::{Error, GenerationBackend, Result};

use crate::config::OllamaConfig;

/// Generations slower than this are logged at WARN.
const SLOW_GENERATION_MS: u64 = 30_000;

/// Ollama backend speaking the `/api/chat` endpoint.
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    /// Create a backend from explicit configuration.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            base_url = %config.base_url,
            model = %config.model,
            "Initializing Ollama backend"
        );
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OllamaConfig::from_env())
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Shared by both generate variants. The chat endpoint keeps reasoning
    /// output of thinking models out of `message.content`.
    async fn generate_internal(
        &self,
        system: &str,
        prompt: &str,
        format: Option<serde_json::Value>,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let start = Instant::now();

        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let think = format.as_ref().map(|_| false);
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            stream: false,
            format,
            think,
            options: max_tokens.map(|n| ChatOptions { num_predict: n }),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.config.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout {
                        operation: "ollama_chat",
                        after_ms: self.config.timeout_secs * 1000,
                    }
                } else {
                    Error::Inference(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > SLOW_GENERATION_MS {
            warn!(
                duration_ms = elapsed,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(content)
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.config.model, prompt_len = prompt.len()))]
    async fn generate_with_system(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        self.generate_internal(system, prompt, None, max_tokens).await
    }

    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "ollama", op = "generate_json", model = %self.config.model, prompt_len = prompt.len()))]
    async fn generate_json_with_system(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        self.generate_internal(
            system,
            prompt,
            Some(serde_json::Value::String("json".to_string())),
            max_tokens,
        )
        .await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatOptions {
    /// Cap on generated tokens.
    num_predict: u32,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// `"json"` asks Ollama to constrain output to valid JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    /// Suppresses chain-of-thought for thinking models on JSON calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_omits_unset_options() {
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![],
            stream: false,
            format: None,
            think: None,
            options: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("format").is_none());
        assert!(json.get("options").is_none());
    }

    #[test]
    fn test_chat_request_json_mode() {
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![],
            stream: false,
            format: Some(serde_json::json!("json")),
            think: Some(false),
            options: Some(ChatOptions { num_predict: 256 }),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["format"], "json");
        assert_eq!(json["think"], false);
        assert_eq!(json["options"]["num_predict"], 256);
    }

    #[test]
    fn test_model_name() {
        let backend = OllamaBackend::new(OllamaConfig::default().with_model("qwen3:8b")).unwrap();
        assert_eq!(backend.model_name(), "qwen3:8b");
    }
}
