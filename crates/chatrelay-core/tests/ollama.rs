//! Integration tests for the Ollama client and fact source using wiremock.

use std::time::Duration;

use chatrelay_core::{
    FactSource, Frame, HttpFactSource, ModelClient, OllamaClient, ReframeMode, UpstreamError, reframe,
};
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn client(server: &MockServer) -> OllamaClient {
    OllamaClient::new(server.uri(), TIMEOUT).expect("client builds")
}

#[tokio::test]
async fn generate_posts_streaming_request_and_yields_body() {
    let server = MockServer::start().await;
    let body = "{\"response\":\"Hello\",\"done\":false}\n{\"response\":\" world\",\"done\":true}\n";

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "llama3",
            "prompt": "User: hi\nAssistant: ",
            "stream": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let fragments = client(&server)
        .stream_generate("User: hi\nAssistant: ", "llama3")
        .await
        .expect("stream opens");

    let frames: Vec<Frame> = reframe(fragments, ReframeMode::Repair).collect().await;
    let text: String = frames.iter().filter_map(Frame::response).collect();
    assert_eq!(text, "Hello world");
    assert!(frames.last().is_some_and(Frame::is_done));
}

#[tokio::test]
async fn generate_non_success_status_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"error":"model 'nope' not found"}"#))
        .mount(&server)
        .await;

    let result = client(&server).stream_generate("p", "nope").await;
    match result {
        Err(UpstreamError::Status { status, body }) => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"), "{body}");
        }
        Err(other) => panic!("expected Status error, got: {other:?}"),
        Ok(_) => panic!("expected Status error, got a stream"),
    }
}

#[tokio::test]
async fn generate_against_closed_port_is_a_connect_error() {
    let client = OllamaClient::new("http://127.0.0.1:1", TIMEOUT).expect("client builds");
    let result = client.stream_generate("p", "m").await;
    match result {
        Err(e @ UpstreamError::Connect { .. }) => {
            assert!(e.to_string().contains("Cannot connect"), "{e}");
        }
        Err(other) => panic!("expected Connect error, got: {other:?}"),
        Ok(_) => panic!("expected Connect error, got a stream"),
    }
}

#[tokio::test]
async fn list_models_maps_tags() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": "llama3:latest", "size": 4661224676_u64, "digest": "abc"},
                {"name": "gemma3"}
            ]
        })))
        .mount(&server)
        .await;

    let models = client(&server).list_models().await.expect("listing succeeds");
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].name, "llama3:latest");
    assert_eq!(models[0].size, 4_661_224_676);
    assert_eq!(models[1].size, 0);
}

#[tokio::test]
async fn list_models_with_no_models_key_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let models = client(&server).list_models().await.expect("listing succeeds");
    assert!(models.is_empty());
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_tolerated() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(format!("{}/", server.uri()), TIMEOUT).expect("client builds");
    assert!(client.list_models().await.is_ok());
}

// ── Fact source ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fact_source_maps_payload() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "animal": "Axolotl",
            "fact": "Did you know that axolotls regrow limbs."
        })))
        .mount(&server)
        .await;

    let source = HttpFactSource::new(format!("{}/api/generate", server.uri()), TIMEOUT).expect("builds");
    let fact = source.fetch_fact().await.expect("fact returned");
    assert_eq!(fact.subject, "Axolotl");
    assert_eq!(fact.text, "Did you know that axolotls regrow limbs.");
}

#[tokio::test]
async fn fact_source_missing_subject_defaults_to_unknown() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fact": "x"})))
        .mount(&server)
        .await;

    let source = HttpFactSource::new(server.uri(), TIMEOUT).expect("builds");
    let fact = source.fetch_fact().await.expect("fact returned");
    assert_eq!(fact.subject, "Unknown");
}

#[tokio::test]
async fn fact_source_failures_are_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"animal": "Cat", "fact": ""})))
        .mount(&server)
        .await;

    let down = HttpFactSource::new(format!("{}/down", server.uri()), TIMEOUT).expect("builds");
    assert!(down.fetch_fact().await.is_none());

    let empty = HttpFactSource::new(format!("{}/empty", server.uri()), TIMEOUT).expect("builds");
    assert!(empty.fetch_fact().await.is_none());
}
