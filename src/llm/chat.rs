//! Request construction and response extraction shared by every
//! chat-completions style backend.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::http::{HttpInvoker, HttpRequest, HttpResponse};
use super::{Mode, ProviderConfig, parser};
use crate::error::GenerationError;

/// Prefix put in front of the diff in the user message.
pub const USER_MESSAGE_PREFIX: &str = "Here is the diff: ";

pub fn user_message(diff: &str) -> String {
    format!("{USER_MESSAGE_PREFIX}{diff}")
}

/// Request-scoped sampling seed in `[10, 1000)`.
pub fn random_seed() -> u32 {
    rand::thread_rng().gen_range(10..1000)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// The `system` + `user` pair every backend receives.
pub fn messages(system_prompt: &str, user_message: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: "system".into(),
            content: system_prompt.to_string(),
        },
        ChatMessage {
            role: "user".into(),
            content: user_message.to_string(),
        },
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

/// OpenAI-compatible chat completions body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_prompt: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    pub fn new(config: &ProviderConfig, system_prompt: &str, user_message: &str, stream: bool) -> Self {
        ChatRequest {
            model: config.model.clone(),
            messages: messages(system_prompt, user_message),
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            stream,
            seed: None,
            random_seed: None,
            safe_prompt: None,
            response_format: None,
        }
    }

    /// Ask for a JSON object reply when generating commit messages.
    pub fn json_output_for(mut self, mode: Mode) -> Self {
        if mode == Mode::Commit {
            self.response_format = Some(ResponseFormat {
                kind: "json_object".into(),
            });
        }
        self
    }

    pub fn with_seed(mut self) -> Self {
        self.seed = Some(random_seed());
        self
    }

    /// Mistral-family spelling of the seed plus their prompt-safety switch.
    pub fn with_mistral_options(mut self) -> Self {
        self.random_seed = Some(random_seed());
        self.safe_prompt = Some(false);
        self
    }

    pub fn to_json(&self) -> Result<String, GenerationError> {
        serde_json::to_string(self).map_err(|e| GenerationError::Configuration(format!(
            "failed to encode chat request: {e}"
        )))
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatMessageResponse>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageResponse {
    pub content: Option<String>,
}

/// Only logged. Compatible servers often send a partial object.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl ChatResponse {
    /// Content of the first choice; an empty list or blank content is an error.
    pub fn into_content(self) -> Result<String, GenerationError> {
        if let Some(usage) = &self.usage {
            log::info!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

/// Turn a non-2xx response into a classified backend error.
pub fn ensure_success(resp: HttpResponse) -> Result<HttpResponse, GenerationError> {
    if resp.is_success() {
        return Ok(resp);
    }

    let status = resp.status;
    let body = resp.text()?;
    log::debug!("HTTP {status} error body: {}", truncate(&body, 2000));

    Err(parser::backend_error(status, &body))
}

/// POST a non-streaming chat request and return the first choice's content.
pub fn send_chat(
    invoker: &dyn HttpInvoker,
    provider: &str,
    request: HttpRequest,
) -> Result<String, GenerationError> {
    let resp = ensure_success(invoker.execute(&request)?)?;
    let text = resp.text()?;

    log::trace!("{provider} raw response: {}", truncate(&text, 3000));

    let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| GenerationError::Decode {
        provider: provider.to_string(),
        detail: e.to_string(),
    })?;

    parsed.into_content()
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    object: Option<String>,
}

/// `GET {host}/v1/models` and return the ids whose `object` is `model` (or unset).
pub fn list_models(
    invoker: &dyn HttpInvoker,
    provider: &str,
    request: HttpRequest,
) -> Result<Vec<String>, GenerationError> {
    let resp = ensure_success(invoker.execute(&request)?)?;
    let text = resp.text()?;

    let list: ModelList = serde_json::from_str(&text).map_err(|e| GenerationError::Decode {
        provider: provider.to_string(),
        detail: e.to_string(),
    })?;

    Ok(list
        .data
        .into_iter()
        .filter(|m| m.object.as_deref().is_none_or(|o| o == "model"))
        .map(|m| m.id)
        .collect())
}

/// Join a base host and a path without doubling slashes.
pub fn join_url(host: &str, path: &str) -> String {
    format!(
        "{}/{}",
        host.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Truncate long strings for debug logging.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let mut cut = max_len;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...\n[truncated {} chars]", &s[..cut], s.len() - cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> ProviderConfig {
        ProviderConfig {
            model: "mistral-small-latest".into(),
            temperature: 0.2,
            top_p: 0.5,
            max_tokens: 300,
            timeout: Duration::from_secs(5),
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn test_commit_request_body() {
        let body = ChatRequest::new(&config(), "sys", &user_message("+foo"), false)
            .json_output_for(Mode::Commit)
            .with_mistral_options();
        let value: serde_json::Value = serde_json::from_str(&body.to_json().unwrap()).unwrap();

        assert_eq!(value["model"], "mistral-small-latest");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][0]["content"], "sys");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "Here is the diff: +foo");
        assert_eq!(value["max_tokens"], 300);
        assert_eq!(value["stream"], false);
        assert_eq!(value["safe_prompt"], false);
        assert_eq!(value["response_format"]["type"], "json_object");
        let seed = value["random_seed"].as_u64().unwrap();
        assert!((10..1000).contains(&seed));
        assert!(value.get("seed").is_none());
    }

    #[test]
    fn test_review_request_has_no_response_format() {
        let body = ChatRequest::new(&config(), "sys", "diff", false).json_output_for(Mode::Review);
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("response_format").is_none());
        assert!(value.get("random_seed").is_none());
    }

    #[test]
    fn test_seed_range() {
        for _ in 0..200 {
            let seed = random_seed();
            assert!((10..1000).contains(&seed));
        }
    }

    #[test]
    fn test_empty_choices_is_empty_response() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(parsed.into_content(), Err(GenerationError::EmptyResponse)));
    }

    #[test]
    fn test_blank_content_is_empty_response() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"role": "assistant", "content": "  "}}]}"#)
                .unwrap();
        assert!(matches!(parsed.into_content(), Err(GenerationError::EmptyResponse)));
    }

    #[test]
    fn test_partial_usage_still_decodes() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "feat: x"}}], "usage": {"prompt_tokens": 10, "total_tokens": 10}}"#,
        )
        .unwrap();

        let usage = parsed.usage.as_ref().unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 0);
        assert_eq!(parsed.into_content().unwrap(), "feat: x");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://a.b/", "/v1/models"), "https://a.b/v1/models");
        assert_eq!(join_url("https://a.b", "chat/completions"), "https://a.b/chat/completions");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let out = truncate("ééé", 3);
        assert!(out.starts_with('é'));
        assert!(out.contains("[truncated"));
    }
}
