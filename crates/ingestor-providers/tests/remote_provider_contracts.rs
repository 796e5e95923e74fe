//! Wiremock-backed contract tests for the remote structurer/embedder HTTP
//! providers: malformed model output, zero-chunks responses, array-content
//! responses, and non-success status codes, none of which touch a real model.

use ingestor_config::{ChatApiStyle, EmbedderConfig, ProviderKind, StructurerConfig};
use ingestor_providers::structurer::remote::RemoteStructurer;
use ingestor_providers::{Embedder, ProviderError, Structurer, StructureResult};
use ingestor_providers::embedder::remote::RemoteEmbedder;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn structurer_config(server: &MockServer, api_style: ChatApiStyle) -> StructurerConfig {
    let mut config = StructurerConfig::from_env();
    config.provider = ProviderKind::Remote;
    config.api_style = api_style;
    config.model_base_url = server.uri();
    config
}

fn embedder_config(server: &MockServer) -> EmbedderConfig {
    let mut config = EmbedderConfig::from_env();
    config.provider = ProviderKind::Remote;
    config.model_base_url = server.uri();
    config
}

fn write_source_file(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn native_response_with_array_content_like_structure_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": r#"{"chunks":[{"chunkIndex":0,"text":"first chunk"},{"chunkIndex":1,"text":"second chunk"}]}"#
        })))
        .mount(&server)
        .await;

    let structurer = RemoteStructurer::new(structurer_config(&server, ChatApiStyle::Native)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let file = write_source_file(dir.path(), "doc.txt", "irrelevant, the mock ignores file contents");

    let result = structurer.structure(&file, "text/plain").await.unwrap();
    let StructureResult::Structured { chunks } = result else {
        panic!("expected Structured, got {result:?}");
    };
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].text, "first chunk");
    assert_eq!(chunks[1].text, "second chunk");
}

#[tokio::test]
async fn openai_style_array_content_parts_are_concatenated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": {
                    "content": [
                        {"text": r#"{"chunks":[{"chunkIndex":0,"#},
                        r#""text":"joined from array parts"}]}"#,
                    ]
                }
            }]
        })))
        .mount(&server)
        .await;

    let structurer = RemoteStructurer::new(structurer_config(&server, ChatApiStyle::OpenAi)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let file = write_source_file(dir.path(), "doc.txt", "irrelevant");

    let result = structurer.structure(&file, "text/plain").await.unwrap();
    let StructureResult::Structured { chunks } = result else {
        panic!("expected Structured, got {result:?}");
    };
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "joined from array parts");
}

#[tokio::test]
async fn malformed_json_response_fails_the_document_not_the_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": "this is not JSON at all"
        })))
        .mount(&server)
        .await;

    let structurer = RemoteStructurer::new(structurer_config(&server, ChatApiStyle::Native)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let file = write_source_file(dir.path(), "doc.txt", "irrelevant");

    let result = structurer.structure(&file, "text/plain").await.unwrap();
    match result {
        StructureResult::Failed { reason } => assert!(reason.contains("no JSON object found")),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn zero_chunks_after_filtering_blank_text_fails_the_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": r#"{"chunks":[{"chunkIndex":0,"text":"   "}]}"#
        })))
        .mount(&server)
        .await;

    let structurer = RemoteStructurer::new(structurer_config(&server, ChatApiStyle::Native)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let file = write_source_file(dir.path(), "doc.txt", "irrelevant");

    let result = structurer.structure(&file, "text/plain").await.unwrap();
    match result {
        StructureResult::Failed { reason } => assert!(reason.contains("zero chunks")),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn structurer_error_status_fails_the_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model backend unavailable"))
        .mount(&server)
        .await;

    let structurer = RemoteStructurer::new(structurer_config(&server, ChatApiStyle::Native)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let file = write_source_file(dir.path(), "doc.txt", "irrelevant");

    let result = structurer.structure(&file, "text/plain").await.unwrap();
    match result {
        StructureResult::Failed { reason } => assert!(reason.contains("HTTP 500")),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn embedder_success_returns_the_vector_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embedding": [0.1, 0.2, 0.3]
        })))
        .mount(&server)
        .await;

    let embedder = RemoteEmbedder::new(embedder_config(&server)).unwrap();
    let embedding = embedder.embed("some chunk text").await.unwrap();
    assert_eq!(embedding.vector, vec![0.1, 0.2, 0.3]);
    assert_eq!(embedding.dimensions, 3);
}

#[tokio::test]
async fn embedder_empty_vector_is_a_malformed_response_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embedding": []
        })))
        .mount(&server)
        .await;

    let embedder = RemoteEmbedder::new(embedder_config(&server)).unwrap();
    let err = embedder.embed("some chunk text").await.unwrap_err();
    assert!(matches!(err, ProviderError::MalformedResponse { .. }));
}

#[tokio::test]
async fn embedder_non_success_status_is_an_error_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let embedder = RemoteEmbedder::new(embedder_config(&server)).unwrap();
    let err = embedder.embed("some chunk text").await.unwrap_err();
    assert!(matches!(err, ProviderError::ErrorResponse { .. }));
}
