//! HTTP-level tests for the OpenAI vision client against a local mock server.

use palletlens_core::config::InferenceConfig;
use palletlens_core::types::{AnalysisError, Credential, DetailLevel, ImageEncoding, NO_DESCRIPTION};
use palletlens_inference::{AnalysisRequest, OpenAiVisionClient, VisionClient, USER_PROMPT};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_API_KEY: &str = "sk-test-key";

fn client_for(server: &MockServer) -> OpenAiVisionClient {
    let config = InferenceConfig {
        base_url: format!("{}/v1", server.uri()),
        ..InferenceConfig::default()
    };
    let client = OpenAiVisionClient::new(config).unwrap();
    client.configure(Credential::new(TEST_API_KEY));
    client
}

fn request() -> AnalysisRequest {
    AnalysisRequest::new(
        ImageEncoding::from_bytes("image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0]),
        DetailLevel::Low,
    )
}

fn completion(content: serde_json::Value) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn test_description_returned_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(json!("A shrink-wrapped pallet with a torn corner."))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server).analyze(request()).await;
    assert_eq!(
        result.description(),
        Some("A shrink-wrapped pallet with a torn corner.")
    );
}

#[tokio::test]
async fn test_request_body_shape() {
    let server = MockServer::start().await;
    let req = request();
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "gpt-4.1",
            "max_tokens": 300
        })))
        .and(body_partial_json(json!({
            "messages": [
                { "role": "system" },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": USER_PROMPT },
                        {
                            "type": "image_url",
                            "image_url": { "url": req.encoding().as_str(), "detail": "low" }
                        }
                    ]
                }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!("ok"))))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server).analyze(req).await;
    assert_eq!(result.description(), Some("ok"));
}

#[tokio::test]
async fn test_missing_content_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!(null))))
        .mount(&server)
        .await;

    let result = client_for(&server).analyze(request()).await;
    assert_eq!(result.description(), Some(NO_DESCRIPTION));
}

#[tokio::test]
async fn test_empty_choices_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let result = client_for(&server).analyze(request()).await;
    assert_eq!(result.description(), Some(NO_DESCRIPTION));
}

#[tokio::test]
async fn test_api_error_message_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "message": "Incorrect API key provided",
                "type": "invalid_request_error"
            }
        })))
        .mount(&server)
        .await;

    let result = client_for(&server).analyze(request()).await;
    assert_eq!(
        result.failure(),
        Some(&AnalysisError::Remote("Incorrect API key provided".to_string()))
    );
}

#[tokio::test]
async fn test_unstructured_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let result = client_for(&server).analyze(request()).await;
    match result.failure() {
        Some(AnalysisError::Remote(message)) => {
            assert!(message.starts_with("API error (502"), "got: {}", message);
            assert!(message.contains("bad gateway"));
        }
        other => panic!("expected remote failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unconfigured_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!("unused"))))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.configure(None);

    let result = client.analyze(request()).await;
    assert_eq!(result.failure(), Some(&AnalysisError::NotConfigured));
}

#[tokio::test]
async fn test_repeated_configure_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer sk-test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!("same"))))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let first = client.analyze(request()).await;
    client.configure(Credential::new(TEST_API_KEY));
    client.configure(Credential::new(TEST_API_KEY));
    let second = client.analyze(request()).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_remote_failure() {
    let config = InferenceConfig {
        base_url: "http://127.0.0.1:1/v1".to_string(),
        timeout_secs: 2,
        ..InferenceConfig::default()
    };
    let client = OpenAiVisionClient::new(config).unwrap();
    client.configure(Credential::new(TEST_API_KEY));

    let result = client.analyze(request()).await;
    match result.failure() {
        Some(AnalysisError::Remote(message)) => assert!(message.starts_with("Request failed")),
        other => panic!("expected remote failure, got {:?}", other),
    }
}
