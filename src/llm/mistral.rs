use std::sync::Arc;

use super::chat::{self, ChatRequest};
use super::http::{HttpInvoker, HttpRequest};
use super::{Mode, ProviderAdapter, ProviderConfig, ProviderKind};
use crate::error::GenerationError;

/// Mistral La Plateforme; the model is checked against the live model list.
pub struct MistralAdapter {
    http: Arc<dyn HttpInvoker>,
}

impl MistralAdapter {
    pub fn new(http: Arc<dyn HttpInvoker>) -> Self {
        MistralAdapter { http }
    }
}

impl ProviderAdapter for MistralAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mistral
    }

    fn validate_model(&self, config: &ProviderConfig) -> Result<(), GenerationError> {
        let url = chat::join_url(&config.host, "/v1/models");
        let request = HttpRequest::get(url, config.timeout)
            .bearer(&config.key)
            .header("content-type", "application/json")
            .proxy(config.proxy.as_deref());

        let available = chat::list_models(self.http.as_ref(), "Mistral AI", request)?;
        log::debug!("Mistral AI lists {} model(s)", available.len());

        if available.contains(&config.model) {
            return Ok(());
        }
        Err(GenerationError::InvalidModel {
            provider: "Mistral AI".into(),
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
        let body = ChatRequest::new(config, system_prompt, user_message, false)
            .json_output_for(mode)
            .with_mistral_options();

        let url = chat::join_url(&config.host, "/v1/chat/completions");
        log::info!("Calling Mistral AI model {:?}", config.model);

        let request = HttpRequest::post(url, config.timeout)
            .bearer(&config.key)
            .json_body(body.to_json()?)
            .proxy(config.proxy.as_deref());

        chat::send_chat(self.http.as_ref(), "Mistral AI", request)
    }
}
