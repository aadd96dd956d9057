//! # rolo-inference
//!
//! Text-completion backends and the contact extraction adapter.
//!
//! This crate provides:
//! - Ollama chat backend (default)
//! - Prompt text for every adapter operation
//! - Tolerant parsing of model output into contact fields and query specs
//! - [`LlmExtractor`], the [`ExtractionService`] used by the pipeline
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable the Ollama backend
//! - `mock`: Expose [`mock::MockGenerationBackend`] to dependent crates

pub mod config;
pub mod extractor;
pub mod parse;
pub mod prompts;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use rolo_core::*;

pub use config::OllamaConfig;
pub use extractor::LlmExtractor;

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;
