//! Turn a staged diff into commit-message or code-review candidates through
//! interchangeable LLM backends.

pub mod audit;
pub mod cli_args;
pub mod config;
pub mod error;
pub mod git;
pub mod llm;
pub mod logging;
pub mod pipeline;

pub use error::{ClassifiedError, ErrorCategory, ErrorKind, GenerationError};
pub use llm::{Candidate, DiffPayload, Mode, ProviderAdapter, ProviderConfig, ProviderKind};
pub use pipeline::{DisplayItem, Generation, Outcome, RequestContext};
