pub mod chat;
pub mod codestral;
pub mod http;
pub mod mistral;
pub mod ollama;
pub mod openai;
pub mod parser;
pub mod perplexity;
pub mod prompt_builder;
pub mod prompts;
pub mod stream;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::GenerationError;
use crate::pipeline::{self, RequestContext};
use http::HttpInvoker;

/// What the reply is going to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Commit,
    Review,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Commit => "commit",
            Mode::Review => "review",
        }
    }
}

/// The staged diff plus the mode it was captured for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffPayload {
    diff: String,
    mode: Mode,
}

impl DiffPayload {
    pub fn new(diff: impl Into<String>, mode: Mode) -> Self {
        DiffPayload {
            diff: diff.into(),
            mode,
        }
    }

    pub fn diff(&self) -> &str {
        &self.diff
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

/// One suggestion derived from a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub title: String,
    /// Long-form text; empty when the model only produced a title.
    pub body: String,
}

/// One system/user/reply round trip.
#[derive(Debug, Clone)]
pub struct ChatExchange {
    pub system_prompt: String,
    pub user_message: String,
    pub reply: String,
}

/// Per-backend settings. Adapters only ever read this.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub host: String,
    /// Chat endpoint path, for backends that allow overriding it.
    pub path: Option<String>,
    pub key: String,
    /// Authorization scheme placed before the key.
    pub auth: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub proxy: Option<String>,
    pub stream: bool,
    pub include_body: bool,
    /// Context window requested from Ollama.
    pub num_ctx: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            host: String::new(),
            path: None,
            key: String::new(),
            auth: "Bearer".to_string(),
            model: String::new(),
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 1024,
            timeout: Duration::from_millis(10_000),
            proxy: None,
            stream: false,
            include_body: false,
            num_ctx: 2048,
        }
    }
}

impl ProviderConfig {
    /// Defaults for `kind` with its stock host and model filled in.
    pub fn for_kind(kind: ProviderKind) -> Self {
        ProviderConfig {
            host: kind.default_host().to_string(),
            model: kind.default_model().to_string(),
            ..ProviderConfig::default()
        }
    }
}

/// Contract every backend implements.
///
/// Only [`validate_model`](ProviderAdapter::validate_model) and
/// [`invoke_chat`](ProviderAdapter::invoke_chat) are backend specific; prompt
/// rendering, parsing and audit logging run through [`pipeline`].
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Label shown in front of every display item, e.g. `[MistralAI]`.
    fn label(&self, _config: &ProviderConfig) -> String {
        format!("[{}]", self.kind().display_name())
    }

    /// Backend name written into audit records.
    fn audit_name(&self, _config: &ProviderConfig) -> String {
        self.kind().display_name().to_string()
    }

    fn user_message(&self, diff: &str) -> String {
        chat::user_message(diff)
    }

    /// Checks the configured model before any generation call is made.
    fn validate_model(&self, config: &ProviderConfig) -> Result<(), GenerationError>;

    /// One logical chat completion. Streaming backends drain the whole stream
    /// before returning.
    fn invoke_chat(
        &self,
        system_prompt: &str,
        user_message: &str,
        mode: Mode,
        config: &ProviderConfig,
    ) -> Result<String, GenerationError>;

    fn generate_commit_message(
        &self,
        diff: &str,
        ctx: &RequestContext<'_>,
    ) -> Result<Vec<Candidate>, GenerationError> {
        pipeline::generate_candidates(self, Mode::Commit, diff, ctx)
    }

    fn generate_code_review(
        &self,
        diff: &str,
        ctx: &RequestContext<'_>,
    ) -> Result<Vec<Candidate>, GenerationError> {
        pipeline::generate_candidates(self, Mode::Review, diff, ctx)
    }
}

/// Registry of supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ProviderKind {
    #[value(name = "openai")]
    OpenAi,
    Mistral,
    Codestral,
    Perplexity,
    Ollama,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::OpenAi,
        ProviderKind::Mistral,
        ProviderKind::Codestral,
        ProviderKind::Perplexity,
        ProviderKind::Ollama,
    ];

    /// Key used in the config file and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Codestral => "codestral",
            ProviderKind::Perplexity => "perplexity",
            ProviderKind::Ollama => "ollama",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "ChatGPT",
            ProviderKind::Mistral => "MistralAI",
            ProviderKind::Codestral => "Codestral",
            ProviderKind::Perplexity => "Perplexity",
            ProviderKind::Ollama => "Ollama",
        }
    }

    pub fn default_host(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Mistral => "https://api.mistral.ai",
            ProviderKind::Codestral => "https://codestral.mistral.ai",
            ProviderKind::Perplexity => "https://api.perplexity.ai",
            ProviderKind::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Mistral => "mistral-small-latest",
            ProviderKind::Codestral => "codestral-latest",
            ProviderKind::Perplexity => "sonar",
            ProviderKind::Ollama => "llama3.2",
        }
    }

    /// Environment variable holding the API key, if the backend needs one.
    pub fn key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Mistral => Some("MISTRAL_API_KEY"),
            ProviderKind::Codestral => Some("CODESTRAL_API_KEY"),
            ProviderKind::Perplexity => Some("PERPLEXITY_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(name))
    }
}

/// Build the adapter for `kind` on top of `invoker`.
pub fn build_adapter(kind: ProviderKind, invoker: Arc<dyn HttpInvoker>) -> Box<dyn ProviderAdapter> {
    log::debug!("Using {} adapter", kind.display_name());

    match kind {
        ProviderKind::OpenAi => Box::new(openai::OpenAiAdapter::new(invoker)),
        ProviderKind::Mistral => Box::new(mistral::MistralAdapter::new(invoker)),
        ProviderKind::Codestral => Box::new(codestral::CodestralAdapter::new(invoker)),
        ProviderKind::Perplexity => Box::new(perplexity::PerplexityAdapter::new(invoker)),
        ProviderKind::Ollama => Box::new(ollama::OllamaAdapter::new(invoker)),
    }
}
