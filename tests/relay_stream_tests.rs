//! # Relay Stream Tests
//!
//! Drives the relay end to end: the reqwest upstream against a wiremock
//! server, and the relay core against hand-built byte streams.

use bytes::Bytes;
use chat_relay::{
    relay_chat,
    schemas::{Message, OpenAIModel},
    streaming::{RelayOptions, RelayStream},
    ByteStream, HttpClientBuilder, OpenAIUpstream, RelayError, RelayRequest,
};
use futures_util::{stream, StreamExt};
use serde_json::json;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn content_event(text: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"id": "chatcmpl-1", "object": "chat.completion.chunk", "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]})
    )
}

fn stop_event(text: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"choices": [{"index": 0, "delta": {"content": text}, "finish_reason": "stop"}]})
    )
}

fn relay_request(key: &str) -> RelayRequest {
    RelayRequest {
        model: OpenAIModel::new("gpt-3.5-turbo"),
        system_prompt: "You are a helpful assistant.".to_string(),
        key: key.to_string(),
        messages: vec![Message::new("user", "Say hello")],
    }
}

fn upstream_for(server: &MockServer) -> OpenAIUpstream {
    let client = HttpClientBuilder::new().build().unwrap();
    OpenAIUpstream::new(format!("{}/v1/chat/completions", server.uri()), client)
}

async fn mount_stream(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

fn byte_stream(chunks: Vec<Vec<u8>>) -> ByteStream {
    let chunks: Vec<Result<Bytes, RelayError>> =
        chunks.into_iter().map(|chunk| Ok(Bytes::from(chunk))).collect();
    Box::pin(stream::iter(chunks))
}

async fn collect_fragments(relay: RelayStream) -> Vec<Result<Bytes, RelayError>> {
    relay.collect::<Vec<_>>().await
}

#[tokio::test]
async fn test_relays_text_until_stop() {
    let server = MockServer::start().await;
    let body = [content_event("Hello"), content_event(", "), stop_event("world")].concat();
    mount_stream(&server, body).await;

    let relay = relay_chat(&upstream_for(&server), &relay_request("sk-test"), 8)
        .await
        .unwrap();
    assert_eq!(relay.read_to_string().await.unwrap(), "Hello, world");
}

#[tokio::test]
async fn test_sends_streaming_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(header("openai-organization", "org-42"))
        .and(body_json(json!({
            "model": "gpt-3.5-turbo",
            "messages": [
                {"role": "system", "content": "You are a helpful assistant."},
                {"role": "user", "content": "Say hello"}
            ],
            "max_tokens": 1000,
            "temperature": 1.0,
            "stream": true
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(stop_event("ok"), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let upstream = upstream_for(&server).with_organization("org-42");
    let relay = relay_chat(&upstream, &relay_request("sk-test"), 8).await.unwrap();
    assert_eq!(relay.read_to_string().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_empty_key_uses_default_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer sk-default"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(stop_event("hi"), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let upstream = upstream_for(&server).with_default_key("sk-default");
    let relay = relay_chat(&upstream, &relay_request(""), 8).await.unwrap();
    assert_eq!(relay.read_to_string().await.unwrap(), "hi");
}

#[tokio::test]
async fn test_structured_rejection_keeps_all_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "m", "type": "t", "param": "p", "code": "c"}
        })))
        .mount(&server)
        .await;

    let result = relay_chat(&upstream_for(&server), &relay_request("sk-test"), 8).await;
    match result {
        Err(RelayError::Api(error)) => {
            assert_eq!(error.message, "m");
            assert_eq!(error.r#type.as_deref(), Some("t"));
            assert_eq!(error.param, Some(json!("p")));
            assert_eq!(error.code, Some(json!("c")));
        }
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("relay should not start on a rejected request"),
    }
}

#[tokio::test]
async fn test_structured_rejection_with_numeric_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "m", "type": "BadRequestError", "param": null, "code": 400}
        })))
        .mount(&server)
        .await;

    match relay_chat(&upstream_for(&server), &relay_request("sk-test"), 8).await {
        Err(RelayError::Api(error)) => {
            assert_eq!(error.message, "m");
            assert_eq!(error.r#type.as_deref(), Some("BadRequestError"));
            assert!(error.param.is_none());
            assert_eq!(error.code, Some(json!(400)));
        }
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("relay should not start on a rejected request"),
    }
}

#[tokio::test]
async fn test_unstructured_rejection_is_generic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    match relay_chat(&upstream_for(&server), &relay_request("sk-test"), 8).await {
        Err(RelayError::Upstream { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "upstream exploded");
        }
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("relay should not start on a rejected request"),
    }
}

#[tokio::test]
async fn test_empty_rejection_body_uses_status_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    match relay_chat(&upstream_for(&server), &relay_request("sk-test"), 8).await {
        Err(RelayError::Upstream { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "Service Unavailable");
        }
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("relay should not start on a rejected request"),
    }
}

#[tokio::test]
async fn test_non_ok_success_status_is_rejected() {
    // Only 200 carries an event stream
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202).set_body_string(content_event("x")))
        .mount(&server)
        .await;

    let result = relay_chat(&upstream_for(&server), &relay_request("sk-test"), 8).await;
    assert!(matches!(result, Err(RelayError::Upstream { status: 202, .. })));
}

#[tokio::test]
async fn test_closes_without_completion_marker() {
    let server = MockServer::start().await;
    let body = [content_event("one "), content_event("two "), content_event("three")].concat();
    mount_stream(&server, body).await;

    let relay = relay_chat(&upstream_for(&server), &relay_request("sk-test"), 8)
        .await
        .unwrap();
    assert_eq!(relay.read_to_string().await.unwrap(), "one two three");
}

#[tokio::test]
async fn test_status_done_sentinel_emits_nothing() {
    let relay = RelayStream::spawn(
        byte_stream(vec![
            content_event("before").into_bytes(),
            b"data: {\"status\": \"done\"}\n\n".to_vec(),
        ]),
        RelayOptions::default(),
    );

    let fragments = collect_fragments(relay).await;
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].as_ref().unwrap(), &Bytes::from("before"));
}

#[tokio::test]
async fn test_done_marker_closes() {
    let server = MockServer::start().await;
    let body = [content_event("done soon"), "data: [DONE]\n\n".to_string()].concat();
    mount_stream(&server, body).await;

    let relay = relay_chat(&upstream_for(&server), &relay_request("sk-test"), 8)
        .await
        .unwrap();
    assert_eq!(relay.read_to_string().await.unwrap(), "done soon");
}

#[tokio::test]
async fn test_empty_choices_are_skipped() {
    let relay = RelayStream::spawn(
        byte_stream(vec![
            b"data: {\"choices\": []}\n\n".to_vec(),
            content_event("still open").into_bytes(),
        ]),
        RelayOptions::default(),
    );

    let fragments = collect_fragments(relay).await;
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].as_ref().unwrap(), &Bytes::from("still open"));
}

#[tokio::test]
async fn test_malformed_event_errors_after_prior_fragments() {
    let server = MockServer::start().await;
    let body = [
        content_event("kept"),
        "data: this is not json\n\n".to_string(),
        content_event("dropped"),
    ]
    .concat();
    mount_stream(&server, body).await;

    let relay = relay_chat(&upstream_for(&server), &relay_request("sk-test"), 8)
        .await
        .unwrap();
    let fragments = collect_fragments(relay).await;

    assert_eq!(fragments.len(), 2);
    assert_eq!(fragments[0].as_ref().unwrap(), &Bytes::from("kept"));
    match &fragments[1] {
        Err(RelayError::MalformedEvent { data, .. }) => assert_eq!(data, "this is not json"),
        other => panic!("expected malformed event error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_chunk_boundaries_do_not_change_output() {
    let encoded = [
        content_event("Grüße"),
        "retry: 1000\n\n".to_string(),
        "data: {\"choices\": []}\n\n".to_string(),
        content_event(" und "),
        stop_event("Tschüss"),
    ]
    .concat()
    .into_bytes();

    let whole = RelayStream::spawn(byte_stream(vec![encoded.clone()]), RelayOptions::default());
    let expected: Vec<Bytes> = collect_fragments(whole)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(
        expected,
        vec![Bytes::from("Grüße"), Bytes::from(" und "), Bytes::from("Tschüss")]
    );

    for chunk_size in [1, 2, 3, 7, 16, 64] {
        let chunks: Vec<Vec<u8>> = encoded.chunks(chunk_size).map(<[u8]>::to_vec).collect();
        let relay = RelayStream::spawn(byte_stream(chunks), RelayOptions::default());
        let fragments: Vec<Bytes> = collect_fragments(relay)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(fragments, expected, "chunk size {chunk_size}");
    }
}

#[tokio::test]
async fn test_terminal_fragment_precedes_close() {
    let relay = RelayStream::spawn(
        byte_stream(vec![stop_event("last words").into_bytes()]),
        RelayOptions { buffer: 1, model: "gpt-3.5-turbo".to_string() },
    );

    let fragments = collect_fragments(relay).await;
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].as_ref().unwrap(), &Bytes::from("last words"));
}
