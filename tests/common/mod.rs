//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aic2::llm::http::{HttpInvoker, HttpRequest, HttpResponse, TransportError};
use aic2::llm::prompt_builder::PromptOptions;
use aic2::{ProviderConfig, ProviderKind};
use chrono::{NaiveDate, NaiveDateTime};

/// One canned answer for the next HTTP call.
pub enum Scripted {
    Reply(u16, String),
    Fail(TransportError),
}

/// In-memory [`HttpInvoker`] that replays scripted answers and records requests.
#[derive(Default)]
pub struct ScriptedInvoker {
    script: Mutex<VecDeque<Scripted>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl ScriptedInvoker {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(ScriptedInvoker {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().clone()
    }

    /// Parsed JSON body of the `n`th request.
    pub fn body_json(&self, n: usize) -> serde_json::Value {
        let body = self.requests()[n].body.clone().expect("request has a body");
        serde_json::from_str(&body).expect("body is JSON")
    }
}

impl HttpInvoker for ScriptedInvoker {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(Scripted::Reply(status, body)) => Ok(HttpResponse::from_text(status, body)),
            Some(Scripted::Fail(err)) => Err(err),
            None => panic!("unexpected request to {}", request.url),
        }
    }
}

pub fn ok(body: impl Into<String>) -> Scripted {
    Scripted::Reply(200, body.into())
}

/// Chat-completions body whose first choice carries `content`.
pub fn chat_reply(content: &str) -> Scripted {
    ok(serde_json::json!({
        "id": "cmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
    })
    .to_string())
}

pub fn model_list(ids: &[&str]) -> Scripted {
    let data: Vec<_> = ids
        .iter()
        .map(|id| serde_json::json!({ "id": id, "object": "model", "created": 0, "owned_by": "test" }))
        .collect();
    ok(serde_json::json!({ "object": "list", "data": data }).to_string())
}

pub fn config(kind: ProviderKind) -> ProviderConfig {
    ProviderConfig {
        key: "test-key".into(),
        timeout: Duration::from_secs(5),
        ..ProviderConfig::for_kind(kind)
    }
}

pub fn prompt(generate: u8) -> PromptOptions {
    PromptOptions {
        generate,
        ..PromptOptions::default()
    }
}

pub fn fixed_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 2)
        .unwrap()
        .and_hms_opt(3, 4, 5)
        .unwrap()
}
