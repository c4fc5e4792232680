//! Prompt -> model validation -> chat call -> parse, and the display items the
//! selection layer consumes.

use std::error::Error as StdError;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::audit::AuditLogger;
use crate::error::{ClassifiedError, GenerationError};
use crate::llm::parser::{parse_commit_reply, sanitize_review};
use crate::llm::prompt_builder::{PromptOptions, build_prompt};
use crate::llm::{Candidate, ChatExchange, DiffPayload, Mode, ProviderAdapter, ProviderConfig};

/// Everything one request needs besides the diff.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub prompt: &'a PromptOptions,
    pub config: &'a ProviderConfig,
    /// `None` unless audit logging is enabled.
    pub audit: Option<&'a AuditLogger>,
    /// Captured once per process; used for audit file names.
    pub started_at: NaiveDateTime,
}

/// Run the sequential pipeline for one adapter and return its candidates.
pub fn generate_candidates<A: ProviderAdapter + ?Sized>(
    adapter: &A,
    mode: Mode,
    diff: &str,
    ctx: &RequestContext<'_>,
) -> Result<Vec<Candidate>, GenerationError> {
    let system_prompt = build_prompt(ctx.prompt, mode)?;
    log::trace!("System prompt ({}):\n{system_prompt}", mode.as_str());

    adapter.validate_model(ctx.config)?;

    let user_message = adapter.user_message(diff);
    let reply = adapter.invoke_chat(&system_prompt, &user_message, mode, ctx.config)?;
    let exchange = ChatExchange {
        system_prompt,
        user_message,
        reply,
    };

    log::trace!(
        "{} reply:\n{}",
        adapter.audit_name(ctx.config),
        crate::llm::chat::truncate(&exchange.reply, 3000)
    );

    if let Some(audit) = ctx.audit
        && let Err(e) = audit.record(
            &adapter.audit_name(ctx.config),
            diff,
            &exchange.system_prompt,
            &exchange.reply,
            mode,
            ctx.started_at,
        )
    {
        log::warn!("Could not write audit log: {e:#}");
    }

    let candidates = match mode {
        Mode::Commit => parse_commit_reply(&exchange.reply),
        Mode::Review => vec![sanitize_review(&exchange.reply)],
    };

    if candidates.is_empty() {
        return Err(GenerationError::NoCandidates);
    }
    Ok(candidates)
}

/// One row handed to the selection UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayItem {
    pub name: String,
    pub short: String,
    pub value: String,
    pub description: String,
    pub is_error: bool,
    pub disabled: bool,
}

/// Either the candidates of one request or the single error that ended it.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Candidates(Vec<Candidate>),
    Failed(ClassifiedError),
}

/// Result of one request, ready to be turned into display items.
#[derive(Debug, Clone)]
pub struct Generation {
    pub label: String,
    pub mode: Mode,
    pub include_body: bool,
    pub outcome: Outcome,
}

impl Generation {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    /// Display items in candidate order, or exactly one error item.
    pub fn items(&self) -> impl Iterator<Item = DisplayItem> + '_ {
        let (candidates, error) = match &self.outcome {
            Outcome::Candidates(c) => (c.as_slice(), None),
            Outcome::Failed(e) => (&[][..], Some(e)),
        };

        candidates
            .iter()
            .map(move |c| self.candidate_item(c))
            .chain(error.map(|e| self.error_item(e)))
    }

    /// Hard-fail view for non-interactive callers.
    pub fn into_result(self) -> Result<Vec<Candidate>, ClassifiedError> {
        match self.outcome {
            Outcome::Candidates(c) => Ok(c),
            Outcome::Failed(e) => Err(e),
        }
    }

    fn candidate_item(&self, candidate: &Candidate) -> DisplayItem {
        let name = format!("{} {}", self.label, candidate.title);
        match self.mode {
            Mode::Commit => {
                let (value, description) = if self.include_body {
                    let full = if candidate.body.is_empty() {
                        candidate.title.clone()
                    } else {
                        candidate.body.clone()
                    };
                    (full, candidate.body.clone())
                } else {
                    (candidate.title.clone(), String::new())
                };
                DisplayItem {
                    name,
                    short: candidate.title.clone(),
                    value,
                    description,
                    is_error: false,
                    disabled: false,
                }
            }
            Mode::Review => DisplayItem {
                name,
                short: candidate.title.clone(),
                value: candidate.body.clone(),
                description: candidate.body.clone(),
                is_error: false,
                disabled: false,
            },
        }
    }

    fn error_item(&self, error: &ClassifiedError) -> DisplayItem {
        DisplayItem {
            name: format!("{} {}", self.label, error.message),
            short: error.message.clone(),
            value: error.message.clone(),
            description: String::new(),
            is_error: true,
            disabled: true,
        }
    }
}

/// Run one request end to end. Failures never escape: they become the
/// single error outcome.
pub fn run(adapter: &dyn ProviderAdapter, payload: &DiffPayload, ctx: &RequestContext<'_>) -> Generation {
    let label = adapter.label(ctx.config);
    let mode = payload.mode();

    let result = match mode {
        Mode::Commit => adapter.generate_commit_message(payload.diff(), ctx),
        Mode::Review => adapter.generate_code_review(payload.diff(), ctx),
    };

    let outcome = match result {
        Ok(candidates) => {
            log::info!("{label} produced {} candidate(s)", candidates.len());
            Outcome::Candidates(candidates)
        }
        Err(err) => {
            log::debug!("{label} failed: {}", cause_chain(&err));
            Outcome::Failed(ClassifiedError::from(&err))
        }
    };

    Generation {
        label,
        mode,
        include_body: ctx.config.include_body,
        outcome,
    }
}

fn cause_chain(err: &GenerationError) -> String {
    let mut out = format!("{err:?}");
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }
    out
}
