use std::sync::Arc;

use super::chat::{self, ChatRequest};
use super::http::{HttpInvoker, HttpRequest};
use super::{Mode, ProviderAdapter, ProviderConfig, ProviderKind};
use crate::error::GenerationError;

pub const SUPPORTED_MODELS: &[&str] = &[
    "sonar",
    "sonar-pro",
    "sonar-reasoning",
    "sonar-reasoning-pro",
    "sonar-deep-research",
    "r1-1776",
];

/// Perplexity's OpenAI-like endpoint. It has no `/v1` prefix, no seed and no
/// `json_object` response format.
pub struct PerplexityAdapter {
    http: Arc<dyn HttpInvoker>,
}

impl PerplexityAdapter {
    pub fn new(http: Arc<dyn HttpInvoker>) -> Self {
        PerplexityAdapter { http }
    }
}

impl ProviderAdapter for PerplexityAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Perplexity
    }

    fn validate_model(&self, config: &ProviderConfig) -> Result<(), GenerationError> {
        if SUPPORTED_MODELS.contains(&config.model.as_str()) {
            return Ok(());
        }
        Err(GenerationError::InvalidModel {
            provider: "Perplexity".into(),
            model: config.model.clone(),
        })
    }

    fn invoke_chat(
        &self,
        system_prompt: &str,
        user_message: &str,
        _mode: Mode,
        config: &ProviderConfig,
    ) -> Result<String, GenerationError> {
        let body = ChatRequest::new(config, system_prompt, user_message, false);

        let url = chat::join_url(&config.host, "/chat/completions");
        log::info!("Calling Perplexity model {:?}", config.model);

        let request = HttpRequest::post(url, config.timeout)
            .bearer(&config.key)
            .json_body(body.to_json()?)
            .proxy(config.proxy.as_deref());

        chat::send_chat(self.http.as_ref(), "Perplexity", request)
    }
}
