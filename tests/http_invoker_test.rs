//! Adapters driven through the real reqwest invoker against a local mock server.
//!
//! The invoker is blocking, so each call runs on a blocking thread.

mod common;

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use aic2::llm::build_adapter;
use aic2::llm::http::{HttpInvoker, HttpRequest, ReqwestInvoker, TransportError};
use aic2::pipeline::{self, RequestContext};
use aic2::{DiffPayload, ErrorKind, Generation, Mode, ProviderConfig, ProviderKind};
use common::{fixed_time, prompt};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Run one generation against `host` on a blocking thread.
async fn generate(kind: ProviderKind, config: ProviderConfig, diff: &str) -> Generation {
    let diff = diff.to_string();
    tokio::task::spawn_blocking(move || {
        let adapter = build_adapter(kind, Arc::new(ReqwestInvoker::new()));
        let prompt = prompt(1);
        let ctx = RequestContext {
            prompt: &prompt,
            config: &config,
            audit: None,
            started_at: fixed_time(),
        };
        pipeline::run(adapter.as_ref(), &DiffPayload::new(diff, Mode::Commit), &ctx)
    })
    .await
    .expect("blocking task panicked")
}

fn config_for(kind: ProviderKind, host: String) -> ProviderConfig {
    ProviderConfig {
        host,
        key: "secret".into(),
        timeout: Duration::from_secs(5),
        ..ProviderConfig::for_kind(kind)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn mistral_round_trip_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{ "id": "mistral-small-latest", "object": "model" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "model": "mistral-small-latest",
            "stream": false,
            "response_format": { "type": "json_object" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "{\"commitMessages\":[{\"title\":\"chore: bump\",\"value\":\"chore: bump\\n\\nDeps.\"}]}"
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generation = generate(ProviderKind::Mistral, config_for(ProviderKind::Mistral, server.uri()), "+dep").await;

    let candidates = generation.into_result().unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].title, "chore: bump");
    assert_eq!(candidates[0].body, "chore: bump\n\nDeps.");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_with_prose_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let generation = generate(
        ProviderKind::Perplexity,
        config_for(ProviderKind::Perplexity, server.uri()),
        "+x",
    )
    .await;

    let err = generation.into_result().unwrap_err();
    assert_eq!(err.message, "HTTP 500: Unknown error");
    assert_eq!(err.kind, ErrorKind::MalformedBackendError);
}

#[tokio::test(flavor = "multi_thread")]
async fn openai_sse_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "gpt-4o-mini", "object": "model" }]
        })))
        .mount(&server)
        .await;

    let sse = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"refactor: split\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" module\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(&server)
        .await;

    let config = ProviderConfig {
        stream: true,
        ..config_for(ProviderKind::OpenAi, server.uri())
    };
    let generation = generate(ProviderKind::OpenAi, config, "+m").await;

    let candidates = generation.into_result().unwrap();
    assert_eq!(candidates[0].title, "refactor: split module");
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_backend_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let url = format!("{}/chat/completions", server.uri());
    let result = tokio::task::spawn_blocking(move || {
        let request = HttpRequest::post(url, Duration::from_millis(200)).json_body("{}".into());
        ReqwestInvoker::new().execute(&request).map(|r| r.status)
    })
    .await
    .unwrap();

    match result {
        Err(TransportError::Timeout { host, after }) => {
            assert_eq!(host, "127.0.0.1");
            assert_eq!(after, Duration::from_millis(200));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[test]
fn refused_connection_is_classified() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let request = HttpRequest::get(format!("http://127.0.0.1:{port}/"), Duration::from_secs(2));
    let err = ReqwestInvoker::new().execute(&request).map(|r| r.status).unwrap_err();

    assert!(
        matches!(err, TransportError::ConnectionRefused { ref host } if host == "127.0.0.1"),
        "got {err:?}"
    );
}

#[test]
fn ollama_not_running_is_backend_unavailable() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let host = format!("http://127.0.0.1:{port}");

    let adapter = build_adapter(ProviderKind::Ollama, Arc::new(ReqwestInvoker::new()));
    let prompt = prompt(1);
    let config = config_for(ProviderKind::Ollama, host.clone());
    let ctx = RequestContext {
        prompt: &prompt,
        config: &config,
        audit: None,
        started_at: fixed_time(),
    };
    let generation = pipeline::run(adapter.as_ref(), &DiffPayload::new("+x", Mode::Commit), &ctx);

    let err = generation.into_result().unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConnectionRefused);
    assert_eq!(err.message, format!("Error connecting to {host}. Please run Ollama or check host"));
}

#[test]
fn unresolvable_host_is_classified() {
    let request = HttpRequest::get("http://no-such-host-aic2.invalid/v1/models", Duration::from_secs(5));
    let err = ReqwestInvoker::new().execute(&request).map(|r| r.status).unwrap_err();

    match err {
        TransportError::HostUnreachable { ref host, .. } => assert_eq!(host, "no-such-host-aic2.invalid"),
        other => panic!("expected a DNS failure, got {other:?}"),
    }
}
