//! Integration tests against a mock predictions service
//!
//! Covers the full submit/stream cycle over real HTTP: request body and
//! headers, status and decode failures, and event-stream parsing.

use llama_stream::api::GenerationOverrides;
use llama_stream::{ApiError, Connector, GenerationRequest, StreamChunk};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-api-key";

fn connector(server: &MockServer) -> Connector {
    Connector::new(format!("{}/v1/predictions", server.uri()), API_KEY)
}

fn envelope(server: &MockServer) -> serde_json::Value {
    json!({
        "id": "p1",
        "status": "starting",
        "urls": {
            "get": format!("{}/v1/predictions/p1", server.uri()),
            "stream": format!("{}/v1/streams/p1", server.uri()),
            "cancel": format!("{}/v1/predictions/p1/cancel", server.uri())
        }
    })
}

async fn mount_stream(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/v1/streams/p1"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(header("Accept", "text/event-stream"))
        .and(header("Cache-Control", "no-store"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

async fn collect(connector: &Connector, url: String) -> Vec<StreamChunk> {
    let mut stream = connector.stream(url);
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.recv().await {
        chunks.push(chunk);
    }
    chunks
}

fn texts(chunks: &[StreamChunk]) -> Vec<String> {
    chunks
        .iter()
        .filter_map(|c| match c {
            StreamChunk::TextDelta(t) => Some(t.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_submit_returns_stream_url() {
    let server = MockServer::start().await;
    let request = GenerationRequest::new_custom(
        "Tell me a joke",
        "You are funny.",
        GenerationOverrides::new().with_max_new_tokens(128),
    );

    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "stream": true,
            "input": {
                "top_k": 0,
                "top_p": 1,
                "prompt": "Tell me a joke",
                "temperature": 0.75,
                "system_prompt": "You are funny.",
                "length_penalty": 1,
                "max_new_tokens": 128,
                "prompt_template": "<s>[INST] <<SYS>>\n{system_prompt}\n<</SYS>>\n\n{prompt} [/INST]",
                "presence_penalty": 0
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(envelope(&server)))
        .expect(1)
        .mount(&server)
        .await;

    let url = assert_ok!(connector(&server).submit(&request).await);
    assert_eq!(url, format!("{}/v1/streams/p1", server.uri()));
}

#[tokio::test]
async fn test_submit_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let result = connector(&server)
        .submit(&GenerationRequest::new_default("p", "s"))
        .await;

    match result {
        Err(ApiError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("Expected Status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_malformed_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .respond_with(ResponseTemplate::new(201).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let result = connector(&server)
        .submit(&GenerationRequest::new_default("p", "s"))
        .await;

    assert!(matches!(result, Err(ApiError::ResponseDecode(_))));
}

#[tokio::test]
async fn test_stream_fragments_then_done() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        "event: output\nid: 1:0\ndata: Why\n\nevent: output\nid: 1:1\ndata:  did\n\n\
         : keep-alive\n\nevent: done\ndata: {}\n\n",
    )
    .await;

    let chunks = collect(&connector(&server), format!("{}/v1/streams/p1", server.uri())).await;

    assert_eq!(texts(&chunks), vec!["Why", " did"]);
    assert_eq!(chunks.len(), 3);
    assert!(matches!(chunks[2], StreamChunk::Done));
}

#[tokio::test]
async fn test_stream_without_terminal_still_completes() {
    let server = MockServer::start().await;
    mount_stream(&server, "data: foo\r\n").await;

    let chunks = collect(&connector(&server), format!("{}/v1/streams/p1", server.uri())).await;

    assert_eq!(texts(&chunks), vec!["foo"]);
    assert_eq!(chunks.len(), 2);
    assert!(matches!(chunks[1], StreamChunk::Done));
}

#[tokio::test]
async fn test_stream_open_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/streams/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let chunks = collect(&connector(&server), format!("{}/v1/streams/gone", server.uri())).await;

    assert_eq!(chunks.len(), 1);
    assert!(matches!(
        chunks[0],
        StreamChunk::Error(ApiError::Status { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_empty_stream_url_fails_on_open() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"urls": {"get": "x"}})))
        .mount(&server)
        .await;

    let connector = connector(&server);
    let url = connector
        .submit(&GenerationRequest::new_default("p", "s"))
        .await
        .unwrap();
    assert_eq!(url, "");

    let chunks = collect(&connector, url).await;
    assert_eq!(chunks.len(), 1);
    assert!(matches!(chunks[0], StreamChunk::Error(ApiError::Http(_))));
}

#[tokio::test]
async fn test_generate_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(envelope(&server)))
        .mount(&server)
        .await;
    mount_stream(&server, "data: Hello\ndata: , \ndata: world\ndata: {}\n").await;

    let stream = assert_ok!(
        connector(&server)
            .generate(&GenerationRequest::new_default("Say hello", "Be brief."))
            .await
    );
    let text = assert_ok!(stream.collect_text().await);

    assert_eq!(text, "Hello, world");
}

#[tokio::test]
async fn test_concurrent_streams_share_connector() {
    let server = MockServer::start().await;
    mount_stream(&server, "data: a\ndata: b\ndata: {}\n").await;

    let connector = connector(&server);
    let url = format!("{}/v1/streams/p1", server.uri());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let connector = connector.clone();
            let url = url.clone();
            tokio::spawn(async move { connector.stream(url).collect_text().await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "ab");
    }
}
