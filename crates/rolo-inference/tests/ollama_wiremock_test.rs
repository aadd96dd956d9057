//! Integration tests for the Ollama chat backend against a mock server.

#![cfg(feature = "ollama")]

use std::sync::Arc;

use rolo_core::{Error, ExtractionService, GenerationBackend};
use rolo_inference::{prompts, LlmExtractor, OllamaBackend, OllamaConfig};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "model": "test-model",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}

fn backend_for(server: &MockServer) -> OllamaBackend {
    let config = OllamaConfig::default()
        .with_base_url(server.uri())
        .with_model("test-model")
        .with_timeout_secs(5);
    OllamaBackend::new(config).expect("Failed to create backend")
}

#[tokio::test]
async fn test_generate_returns_message_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "stream": false,
            "options": { "num_predict": 64 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("Hello there")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server);
    let out = backend
        .generate_with_system("be brief", "hi", Some(64))
        .await
        .unwrap();
    assert_eq!(out, "Hello there");
}

#[tokio::test]
async fn test_json_generation_requests_json_format() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({
            "format": "json",
            "think": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("{\"ok\":true}")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server);
    let out = backend
        .generate_json_with_system("json only", "go", None)
        .await
        .unwrap();
    assert_eq!(out, "{\"ok\":true}");
}

#[tokio::test]
async fn test_non_success_status_is_inference_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server);
    let err = backend
        .generate_with_system("sys", "hi", None)
        .await
        .unwrap_err();
    match err {
        Error::Inference(msg) => assert!(msg.contains("model not loaded")),
        other => panic!("Expected Inference error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_extractor_over_ollama() {
    let mock_server = MockServer::start().await;

    let content = serde_json::json!({
        "name": "Sarah Chen",
        "company": "Stripe",
        "role": "product manager",
        "personalDetails": "loves rock climbing",
        "birthdayMonth": "March",
        "birthdayDay": 14
    })
    .to_string();

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({
            "messages": [{ "role": "system", "content": prompts::EXTRACT_PERSON_SYSTEM }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(&content)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let extractor = LlmExtractor::new(Arc::new(backend_for(&mock_server)));
    let fields = extractor
        .extract_person("Met Sarah Chen, she's a PM at Stripe. Birthday March 14.")
        .await
        .unwrap();
    assert_eq!(fields.name, "Sarah Chen");
    assert_eq!(fields.birthday_month, Some(3));
    assert_eq!(fields.birthday_day, Some(14));
}

#[tokio::test]
async fn test_extractor_maps_backend_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let extractor = LlmExtractor::new(Arc::new(backend_for(&mock_server)));
    let err = extractor.tidy_transcript("um hi").await.unwrap_err();
    assert!(matches!(
        err,
        Error::ExtractionFailed {
            operation: "tidy_transcript",
            ..
        }
    ));
}
