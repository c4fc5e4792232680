use std::sync::Arc;

use super::chat::{self, ChatRequest};
use super::http::{HttpInvoker, HttpRequest};
use super::{Mode, ProviderAdapter, ProviderConfig, ProviderKind};
use crate::error::GenerationError;

/// Models the Codestral endpoint serves.
pub const SUPPORTED_MODELS: &[&str] = &["codestral-latest", "codestral-2501"];

/// Mistral's dedicated code endpoint. No model listing exists, so validation
/// is a static allow-list.
pub struct CodestralAdapter {
    http: Arc<dyn HttpInvoker>,
}

impl CodestralAdapter {
    pub fn new(http: Arc<dyn HttpInvoker>) -> Self {
        CodestralAdapter { http }
    }
}

impl ProviderAdapter for CodestralAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Codestral
    }

    fn validate_model(&self, config: &ProviderConfig) -> Result<(), GenerationError> {
        if SUPPORTED_MODELS.contains(&config.model.as_str()) {
            return Ok(());
        }
        Err(GenerationError::InvalidModel {
            provider: "Codestral AI".into(),
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
        log::info!("Calling Codestral model {:?}", config.model);

        let request = HttpRequest::post(url, config.timeout)
            .bearer(&config.key)
            .json_body(body.to_json()?)
            .proxy(config.proxy.as_deref());

        chat::send_chat(self.http.as_ref(), "Codestral", request)
    }
}
