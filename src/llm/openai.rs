use std::sync::Arc;

use serde::Deserialize;

use super::chat::{self, ChatRequest};
use super::http::{HttpInvoker, HttpRequest};
use super::stream::{StreamEvent, read_stream_to_string};
use super::{Mode, ProviderAdapter, ProviderConfig, ProviderKind};
use crate::error::GenerationError;

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// OpenAI and OpenAI-compatible chat completions, optionally streamed over SSE.
pub struct OpenAiAdapter {
    http: Arc<dyn HttpInvoker>,
}

impl OpenAiAdapter {
    pub fn new(http: Arc<dyn HttpInvoker>) -> Self {
        OpenAiAdapter { http }
    }

    fn chat_url(config: &ProviderConfig) -> String {
        if let Some(path) = &config.path {
            return chat::join_url(&config.host, path);
        }

        let base = config.host.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    fn models_url(config: &ProviderConfig) -> String {
        let base = config.host.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/models")
        } else {
            format!("{base}/v1/models")
        }
    }
}

fn parse_stream_line(line: &str) -> Result<StreamEvent, GenerationError> {
    let Some(data) = line.trim_start().strip_prefix("data:") else {
        return Ok(StreamEvent::Skip);
    };

    let data = data.trim();
    if data == "[DONE]" {
        return Ok(StreamEvent::Done);
    }

    let chunk: StreamResponse = serde_json::from_str(data).map_err(|e| GenerationError::Decode {
        provider: "OpenAI stream".into(),
        detail: e.to_string(),
    })?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .map(StreamEvent::Chunk)
        .unwrap_or(StreamEvent::Skip))
}

impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn validate_model(&self, config: &ProviderConfig) -> Result<(), GenerationError> {
        let request = HttpRequest::get(Self::models_url(config), config.timeout)
            .bearer(&config.key)
            .header("content-type", "application/json")
            .proxy(config.proxy.as_deref());

        let models = chat::list_models(self.http.as_ref(), "OpenAI", request)?;
        if models.iter().any(|m| m == &config.model) {
            return Ok(());
        }

        Err(GenerationError::InvalidModel {
            provider: "OpenAI".into(),
            model: config.model.clone(),
        })
    }

    fn invoke_chat(
        &self,
        system_prompt: &str,
        user_message: &str,
        mode: Mode,
        config: &ProviderConfig,
    ) -> Result<String, GenerationError> {
        let body = ChatRequest::new(config, system_prompt, user_message, config.stream)
            .json_output_for(mode)
            .with_seed();

        let url = Self::chat_url(config);
        log::info!("Calling OpenAI model {:?} at {url}", config.model);

        let request = HttpRequest::post(url, config.timeout)
            .bearer(&config.key)
            .json_body(body.to_json()?)
            .proxy(config.proxy.as_deref());

        if !config.stream {
            return chat::send_chat(self.http.as_ref(), "OpenAI", request);
        }

        let resp = chat::ensure_success(self.http.execute(&request)?)?;
        let content = read_stream_to_string(resp.into_reader(), parse_stream_line)?;
        if content.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(content)
    }
}
