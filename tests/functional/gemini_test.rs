//! Functional tests for the Gemini backend against a mock server

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use character_studio::asset::AssetRef;
use character_studio::backend::{GeminiBackend, ImageGenerator};
use character_studio::config::GeminiConfig;
use character_studio::AppError;

const PNG: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D];
const GENERATE_PATH: &str = "/v1beta/models/test-model:generateContent";

fn backend(server: &MockServer) -> GeminiBackend {
    GeminiBackend::new(&GeminiConfig {
        api_key: Some("test-key".to_string()),
        base_url: server.uri(),
        model: "test-model".to_string(),
        timeout_ms: 5000,
    })
    .unwrap()
}

fn image_response() -> Value {
    json!({
        "candidates": [{
            "content": { "parts": [
                { "text": "Done." },
                { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }
            ]},
            "finishReason": "STOP"
        }]
    })
}

async fn request_parts(server: &MockServer) -> Vec<Value> {
    let requests = server.received_requests().await.unwrap();
    let generate = requests
        .iter()
        .find(|r| r.url.path() == GENERATE_PATH)
        .expect("no generate request received");
    let body: Value = generate.body_json().unwrap();
    body["contents"][0]["parts"].as_array().unwrap().clone()
}

#[tokio::test]
async fn test_character_from_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
        .expect(1)
        .mount(&server)
        .await;

    let image = backend(&server)
        .generate_character_from_text("a clockwork owl")
        .await
        .unwrap();

    assert_eq!(image.data_url, "data:image/png;base64,iVBORw0KGgo=");
    assert_eq!(image.text.as_deref(), Some("Done."));

    let parts = request_parts(&server).await;
    assert_eq!(parts.len(), 1);
    assert!(parts[0]["text"].as_str().unwrap().contains("a clockwork owl"));
}

#[tokio::test]
async fn test_pose_fetches_reference_and_sends_inline_images() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/poses/standing.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(PNG.to_vec()),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
        .expect(1)
        .mount(&server)
        .await;

    let character = AssetRef::binary("image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0]);
    let pose = AssetRef::uri(format!("{}/poses/standing.png", server.uri()));
    let apparel = AssetRef::uri("data:image/webp;base64,UklGRg==");

    backend(&server)
        .generate_pose_image(&character, &pose, Some("wave hello"), None, Some(&apparel))
        .await
        .unwrap();

    let parts = request_parts(&server).await;
    assert_eq!(parts.len(), 4);
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
    assert_eq!(parts[2]["inlineData"]["mimeType"], "image/webp");
    assert_eq!(parts[2]["inlineData"]["data"], "UklGRg==");
    let prompt = parts[3]["text"].as_str().unwrap();
    assert!(prompt.contains("apparel shown by image 3"));
    assert!(prompt.contains("wave hello"));
}

#[tokio::test]
async fn test_service_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT" }
        })))
        .mount(&server)
        .await;

    let err = backend(&server)
        .generate_background_from_text("a quiet lake")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Backend(_)));
    assert!(err.to_string().contains("API key not valid"));
}

#[tokio::test]
async fn test_text_only_reply_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I can't help with that." }] } }]
        })))
        .mount(&server)
        .await;

    let character = AssetRef::binary("image/png", PNG.to_vec());
    let err = backend(&server)
        .edit_image(&character, Some("make it night"), None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("did not return an image"));
}

#[tokio::test]
async fn test_corrupt_image_in_reply_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "image/png", "data": "%%% not base64 %%%" } }
            ]}}]
        })))
        .mount(&server)
        .await;

    let err = backend(&server)
        .generate_character_from_text("a clockwork owl")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Backend(_)));
}

#[tokio::test]
async fn test_malformed_input_fails_before_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
        .expect(0)
        .mount(&server)
        .await;

    let style = AssetRef::uri("data:;base64,SGVsbG8=");
    let err = backend(&server)
        .generate_background_from_image(&style, "a castle")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Decode(_)));
}

#[test]
fn test_missing_api_key_is_rejected() {
    if std::env::var("GEMINI_API_KEY").is_ok() {
        return;
    }
    let result = GeminiBackend::new(&GeminiConfig::default());
    assert!(result.is_err());
}
