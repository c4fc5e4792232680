use std::sync::Arc;

use musli::json;
use musli::{Decode, Encode};

use super::chat;
use super::http::{HttpInvoker, HttpRequest, TransportError};
use super::stream::{StreamEvent, read_stream_to_string};
use super::{Mode, ProviderAdapter, ProviderConfig, ProviderKind};
use crate::error::GenerationError;

#[derive(Debug, Encode, Decode)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Encode)]
struct OllamaOptions {
    num_ctx: u32,
    temperature: f32,
    top_p: f32,
    seed: u32,
}

#[derive(Debug, Encode)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    keep_alive: String,
    #[musli(skip_encoding_if = Option::is_none)]
    format: Option<String>,
    options: OllamaOptions,
}

#[derive(Debug, Decode)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Decode)]
struct OllamaStreamResponse {
    #[musli(default)]
    message: Option<OllamaMessage>,
    #[musli(default)]
    done: Option<bool>,
    #[musli(default)]
    error: Option<String>,
}

/// Local or remote Ollama server talking `/api/chat`.
pub struct OllamaAdapter {
    http: Arc<dyn HttpInvoker>,
}

impl OllamaAdapter {
    pub fn new(http: Arc<dyn HttpInvoker>) -> Self {
        OllamaAdapter { http }
    }

    /// Authorization is only sent when a key is configured.
    fn authorize(request: HttpRequest, config: &ProviderConfig) -> HttpRequest {
        if config.key.is_empty() {
            return request;
        }
        request.header("Authorization", format!("{} {}", config.auth, config.key))
    }

    fn encode_request(
        system_prompt: &str,
        user_message: &str,
        mode: Mode,
        config: &ProviderConfig,
    ) -> Result<String, GenerationError> {
        let req_body = OllamaChatRequest {
            model: config.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: user_message.to_string(),
                },
            ],
            stream: config.stream,
            keep_alive: format!("{}ms", config.timeout.as_millis()),
            format: (mode == Mode::Commit).then(|| "json".to_string()),
            options: OllamaOptions {
                num_ctx: config.num_ctx,
                temperature: config.temperature,
                top_p: config.top_p,
                seed: chat::random_seed(),
            },
        };

        json::to_string(&req_body).map_err(|e| {
            GenerationError::Configuration(format!("Failed to encode Ollama JSON request: {e}"))
        })
    }
}

fn parse_stream_line(line: &str) -> Result<StreamEvent, GenerationError> {
    let parsed: OllamaStreamResponse = json::from_str(line).map_err(|e| GenerationError::Decode {
        provider: "Ollama stream".into(),
        detail: e.to_string(),
    })?;

    if let Some(error) = parsed.error {
        return Err(GenerationError::Backend {
            status: 200,
            message: error,
            malformed: false,
        });
    }

    let content = parsed
        .message
        .map(|m| m.content)
        .filter(|c| !c.is_empty());

    match (content, parsed.done.unwrap_or(false)) {
        (Some(chunk), _) => Ok(StreamEvent::Chunk(chunk)),
        (None, true) => Ok(StreamEvent::Done),
        (None, false) => Ok(StreamEvent::Skip),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl ProviderAdapter for OllamaAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn label(&self, config: &ProviderConfig) -> String {
        format!("[{}]", capitalize(&config.model))
    }

    fn audit_name(&self, config: &ProviderConfig) -> String {
        format!("Ollama_{}", config.model)
    }

    /// Probe the server root; Ollama serves whatever model it has pulled.
    fn validate_model(&self, config: &ProviderConfig) -> Result<(), GenerationError> {
        let host = config.host.trim_end_matches('/').to_string();
        let request = Self::authorize(HttpRequest::get(&host, config.timeout), config)
            .proxy(config.proxy.as_deref());

        match self.http.execute(&request) {
            Ok(resp) => {
                chat::ensure_success(resp)?;
                Ok(())
            }
            Err(source @ TransportError::ConnectionRefused { .. }) => {
                Err(GenerationError::BackendUnavailable { host, source })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn invoke_chat(
        &self,
        system_prompt: &str,
        user_message: &str,
        mode: Mode,
        config: &ProviderConfig,
    ) -> Result<String, GenerationError> {
        let body_str = Self::encode_request(system_prompt, user_message, mode, config)?;
        log::trace!("Ollama request body: {}", chat::truncate(&body_str, 3000));

        let url = chat::join_url(&config.host, "/api/chat");
        log::info!("Calling Ollama model {:?} at {url}", config.model);

        let request = Self::authorize(HttpRequest::post(url, config.timeout), config)
            .json_body(body_str)
            .proxy(config.proxy.as_deref());

        let resp = chat::ensure_success(self.http.execute(&request)?)?;

        let content = if config.stream {
            read_stream_to_string(resp.into_reader(), parse_stream_line)?
        } else {
            let resp_text = resp.text()?;
            log::trace!("Ollama raw JSON response: {}", chat::truncate(&resp_text, 3000));

            let parsed: OllamaChatResponse =
                json::from_str(&resp_text).map_err(|e| GenerationError::Decode {
                    provider: "Ollama".into(),
                    detail: e.to_string(),
                })?;
            parsed.message.content
        };

        if content.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_and_audit_name() {
        let adapter = OllamaAdapter::new(Arc::new(crate::llm::http::ReqwestInvoker::new()));
        let cfg = ProviderConfig {
            model: "llama3.2".into(),
            ..ProviderConfig::default()
        };
        assert_eq!(adapter.label(&cfg), "[Llama3.2]");
        assert_eq!(adapter.audit_name(&cfg), "Ollama_llama3.2");
    }

    #[test]
    fn test_stream_lines() {
        assert_eq!(
            parse_stream_line(r#"{"model":"m","message":{"role":"assistant","content":"Hi"},"done":false}"#)
                .unwrap(),
            StreamEvent::Chunk("Hi".into())
        );
        assert_eq!(
            parse_stream_line(r#"{"model":"m","message":{"role":"assistant","content":""},"done":true}"#)
                .unwrap(),
            StreamEvent::Done
        );
        assert!(matches!(
            parse_stream_line(r#"{"error":"model not found"}"#),
            Err(GenerationError::Backend { .. })
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let cfg = ProviderConfig {
            model: "qwen2.5-coder".into(),
            stream: true,
            ..ProviderConfig::default()
        };
        let body = OllamaAdapter::encode_request("sys", "Here is the diff: +x", Mode::Commit, &cfg).unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(value["model"], "qwen2.5-coder");
        assert_eq!(value["stream"], true);
        assert_eq!(value["format"], "json");
        assert_eq!(value["keep_alive"], "10000ms");
        assert_eq!(value["messages"][1]["content"], "Here is the diff: +x");
        assert_eq!(value["options"]["num_ctx"], 2048);
        let seed = value["options"]["seed"].as_u64().unwrap();
        assert!((10..1000).contains(&seed));

        let review = OllamaAdapter::encode_request("sys", "d", Mode::Review, &cfg).unwrap();
        let value: serde_json::Value = serde_json::from_str(&review).unwrap();
        assert!(value.get("format").is_none());
    }
}
