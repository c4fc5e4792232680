//! Error types for the generation pipeline and the classifier that turns them
//! into a single display line.

use serde::Serialize;
use thiserror::Error;

use crate::llm::http::TransportError;

/// Everything that can go wrong between building a prompt and parsing a reply.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Prompt file not found or unreadable: {path}")]
    PromptFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Configuration(String),

    #[error("Invalid model type of {provider}: {model}")]
    InvalidModel { provider: String, model: String },

    #[error("Error connecting to {host}. Please run Ollama or check host")]
    BackendUnavailable {
        host: String,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{message}")]
    Backend {
        status: u16,
        message: String,
        /// The error body could not be parsed into anything meaningful.
        malformed: bool,
    },

    #[error("No content in response. Please open a bug report")]
    EmptyResponse,

    #[error("No candidates in response")]
    NoCandidates,

    #[error("Failed to decode {provider} response: {detail}")]
    Decode { provider: String, detail: String },
}

/// The coarse taxonomy errors are reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    Configuration,
    Transport,
    MalformedResponse,
    Validation,
}

/// Fine-grained kind tag attached to every classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    NetworkUnreachable,
    ConnectionRefused,
    InvalidModel,
    EmptyResponse,
    MalformedBackendError,
    Unknown,
}

impl GenerationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GenerationError::PromptFile { .. } | GenerationError::Configuration(_) => {
                ErrorCategory::Configuration
            }
            GenerationError::InvalidModel { .. } => ErrorCategory::Validation,
            GenerationError::BackendUnavailable { .. } | GenerationError::Transport(_) => {
                ErrorCategory::Transport
            }
            GenerationError::Backend { malformed: false, .. } => ErrorCategory::Transport,
            GenerationError::Backend { malformed: true, .. }
            | GenerationError::EmptyResponse
            | GenerationError::NoCandidates
            | GenerationError::Decode { .. } => ErrorCategory::MalformedResponse,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::InvalidModel { .. } => ErrorKind::InvalidModel,
            GenerationError::BackendUnavailable { .. } => ErrorKind::ConnectionRefused,
            GenerationError::Transport(TransportError::ConnectionRefused { .. }) => {
                ErrorKind::ConnectionRefused
            }
            GenerationError::Transport(
                TransportError::HostUnreachable { .. } | TransportError::Timeout { .. },
            ) => ErrorKind::NetworkUnreachable,
            GenerationError::EmptyResponse | GenerationError::NoCandidates => {
                ErrorKind::EmptyResponse
            }
            GenerationError::Backend { malformed: true, .. } | GenerationError::Decode { .. } => {
                ErrorKind::MalformedBackendError
            }
            _ => ErrorKind::Unknown,
        }
    }
}

/// A failure reduced to a kind tag and one line of human-readable text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub category: ErrorCategory,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, category: ErrorCategory, message: &str) -> Self {
        ClassifiedError {
            kind,
            category,
            message: single_line(message),
        }
    }
}

impl From<&GenerationError> for ClassifiedError {
    fn from(err: &GenerationError) -> Self {
        ClassifiedError::new(err.kind(), err.category(), &err.to_string())
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ClassifiedError {}

/// Collapse every line break run into a single space.
pub fn single_line(message: &str) -> String {
    let collapsed = message
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if collapsed.is_empty() {
        "An unknown error occurred".to_string()
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_collapses_breaks() {
        assert_eq!(single_line("bad\r\nthing\nhappened\r"), "bad thing happened");
    }

    #[test]
    fn test_single_line_empty_falls_back() {
        assert_eq!(single_line("\n\n"), "An unknown error occurred");
    }

    #[test]
    fn test_dns_failure_is_transport_with_host() {
        let err = GenerationError::from(TransportError::HostUnreachable {
            host: "api.mistral.ai".to_string(),
            detail: "failed to lookup address information".to_string(),
        });
        let classified = ClassifiedError::from(&err);

        assert_eq!(classified.category, ErrorCategory::Transport);
        assert_eq!(classified.kind, ErrorKind::NetworkUnreachable);
        assert!(classified.message.contains("api.mistral.ai"));
    }

    #[test]
    fn test_empty_response_is_malformed() {
        let classified = ClassifiedError::from(&GenerationError::EmptyResponse);
        assert_eq!(classified.category, ErrorCategory::MalformedResponse);
        assert_eq!(classified.kind, ErrorKind::EmptyResponse);
    }

    #[test]
    fn test_invalid_model_is_validation() {
        let err = GenerationError::InvalidModel {
            provider: "Codestral".into(),
            model: "gpt-4".into(),
        };
        let classified = ClassifiedError::from(&err);
        assert_eq!(classified.category, ErrorCategory::Validation);
        assert_eq!(classified.kind, ErrorKind::InvalidModel);
        assert_eq!(classified.message, "Invalid model type of Codestral: gpt-4");
    }

    #[test]
    fn test_backend_message_is_single_line() {
        let err = GenerationError::Backend {
            status: 401,
            message: "Unauthorized\nCheck your key".into(),
            malformed: false,
        };
        assert_eq!(ClassifiedError::from(&err).message, "Unauthorized Check your key");
    }
}
