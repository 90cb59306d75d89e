#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Gateway integration tests against a mocked remote service.
// Run with: cargo test --test integration_gemini

use incident_kb::KbError;
use incident_kb::config::GeminiConfig;
use incident_kb::gemini::GeminiClient;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const EMBEDDING_MODEL: &str = "test-embedding";
const GENERATION_MODEL: &str = "test-generation";

fn make_client(server_uri: &str, batch_size: usize) -> GeminiClient {
    let config = GeminiConfig {
        api_base: format!("{}/v1beta", server_uri),
        generation_model: GENERATION_MODEL.to_string(),
        embedding_model: EMBEDDING_MODEL.to_string(),
        batch_size,
        timeout_seconds: 10,
    };
    GeminiClient::new(&config, "test-key".to_string()).expect("Failed to create client")
}

fn batch_path() -> String {
    format!("/v1beta/models/{}:batchEmbedContents", EMBEDDING_MODEL)
}

fn single_path() -> String {
    format!("/v1beta/models/{}:embedContent", EMBEDDING_MODEL)
}

fn generate_path() -> String {
    format!("/v1beta/models/{}:generateContent", GENERATION_MODEL)
}

fn request_texts(request: &Request) -> Vec<String> {
    let body: Value = serde_json::from_slice(&request.body).expect("request body is JSON");
    body["requests"]
        .as_array()
        .expect("batch request carries a requests array")
        .iter()
        .map(|r| {
            r["content"]["parts"][0]["text"]
                .as_str()
                .expect("request part carries text")
                .to_string()
        })
        .collect()
}

/// Echoes one embedding per requested text, encoding the text's trailing
/// number so callers can verify ordering.
struct IndexedBatchResponder;

impl Respond for IndexedBatchResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let embeddings: Vec<Value> = request_texts(request)
            .iter()
            .map(|text| {
                let ordinal: f32 = text
                    .rsplit('-')
                    .next()
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(-1.0);
                json!({ "values": [ordinal, 1.0] })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
    }
}

#[tokio::test]
async fn batch_of_120_splits_into_three_calls_preserving_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(batch_path()))
        .respond_with(IndexedBatchResponder)
        .expect(3)
        .mount(&server)
        .await;

    let client = make_client(&server.uri(), 50);
    let texts: Vec<String> = (0..120).map(|i| format!("incident-{}", i)).collect();

    let vectors = tokio::task::spawn_blocking(move || client.embed_batch(&texts))
        .await
        .expect("task panicked")
        .expect("embed_batch failed");

    assert_eq!(vectors.len(), 120);
    for (i, vector) in vectors.iter().enumerate() {
        assert_eq!(vector.len(), 2);
        assert!(
            (vector[0] - i as f32).abs() < f32::EPSILON,
            "vector {} out of order",
            i
        );
    }

    server.verify().await;
}

#[tokio::test]
async fn count_mismatch_is_a_service_error() {
    let server = MockServer::start().await;

    // Two texts requested, one embedding returned.
    Mock::given(method("POST"))
        .and(path(batch_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embeddings": [{ "values": [1.0, 0.0] }] })),
        )
        .mount(&server)
        .await;

    let client = make_client(&server.uri(), 50);
    let texts = vec!["one".to_string(), "two".to_string()];

    let result = tokio::task::spawn_blocking(move || client.embed_batch(&texts))
        .await
        .expect("task panicked");

    assert!(matches!(result, Err(KbError::Service(_))));
}

#[tokio::test]
async fn single_text_uses_the_single_embedding_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(single_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embedding": { "values": [0.1, 0.2, 0.3] } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = make_client(&server.uri(), 50);
    let texts = vec!["only one".to_string()];

    let vectors = tokio::task::spawn_blocking(move || client.embed_batch(&texts))
        .await
        .expect("task panicked")
        .expect("embed_batch failed");

    assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3]]);
    server.verify().await;
}

#[tokio::test]
async fn empty_batch_makes_no_requests() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = make_client(&server.uri(), 50);
    let vectors = tokio::task::spawn_blocking(move || client.embed_batch(&[]))
        .await
        .expect("task panicked")
        .expect("embed_batch failed");

    assert!(vectors.is_empty());
    server.verify().await;
}

#[tokio::test]
async fn normalize_title_returns_trimmed_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "  Resetting VPN Access on Windows 11\n" }] } }
            ]
        })))
        .mount(&server)
        .await;

    let client = make_client(&server.uri(), 50);
    let title =
        tokio::task::spawn_blocking(move || client.normalize_title("my vpn is broken again"))
            .await
            .expect("task panicked")
            .expect("normalize_title failed");

    assert_eq!(title, "Resetting VPN Access on Windows 11");
}

#[tokio::test]
async fn empty_generation_response_yields_empty_title() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(generate_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = make_client(&server.uri(), 50);
    let title = tokio::task::spawn_blocking(move || client.normalize_title("anything"))
        .await
        .expect("task panicked")
        .expect("normalize_title failed");

    assert_eq!(title, "");
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(single_path()))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = make_client(&server.uri(), 50);
    let result = tokio::task::spawn_blocking(move || client.embed("text"))
        .await
        .expect("task panicked");

    assert!(matches!(result, Err(KbError::Service(_))));
    server.verify().await;
}

#[tokio::test]
async fn malformed_response_is_a_service_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(single_path()))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = make_client(&server.uri(), 50);
    let result = tokio::task::spawn_blocking(move || client.embed("text"))
        .await
        .expect("task panicked");

    assert!(matches!(result, Err(KbError::Service(_))));
}
