//! Converts raw model replies into [`Candidate`]s and digs usable messages out
//! of backend error bodies.
//!
//! Commit replies are expected to be the JSON envelope requested by the commit
//! prompt:
//!
//! ```json
//! {"commitMessages": [{"title": "feat: add foo", "value": "feat: add foo\n\nbody"}]}
//! ```
//!
//! A bare array of `{title, value}` objects or a single object is accepted too.
//! Anything that is not JSON degrades to one title-only candidate.

use serde::Deserialize;
use serde_json::{Value, json};

use super::Candidate;
use crate::error::GenerationError;

/// Key of the array inside the commit-mode JSON envelope.
pub const COMMIT_ENVELOPE_KEY: &str = "commitMessages";

/// Title used for a review whose reply has no usable first line.
pub const REVIEW_LABEL: &str = "Code Review";

/// Error bodies are only scanned for embedded JSON up to this many bytes.
const MAX_ERROR_SCAN_BYTES: usize = 64 * 1024;

/// Opening brackets tried before the scan gives up.
const MAX_SCAN_STARTS: usize = 16;

#[derive(Debug, Deserialize)]
struct RawCandidate {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    value: Option<Value>,
}

/// Parse a commit-mode reply into candidates.
pub fn parse_commit_reply(reply: &str) -> Vec<Candidate> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    match commit_entries(trimmed) {
        Some(entries) => entries
            .into_iter()
            .filter_map(|raw| {
                let title = raw.title.unwrap_or_default().trim().to_string();
                if title.is_empty() {
                    return None;
                }
                let body = match raw.value {
                    Some(Value::String(s)) => s.trim().to_string(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                Some(Candidate { title, body })
            })
            .collect(),
        None => {
            log::debug!("Commit reply is not JSON; using it verbatim as a single title");
            vec![Candidate {
                title: trimmed.to_string(),
                body: String::new(),
            }]
        }
    }
}

/// Locate the list of `{title, value}` entries, if the reply is JSON at all.
fn commit_entries(reply: &str) -> Option<Vec<RawCandidate>> {
    let value = serde_json::from_str::<Value>(reply)
        .ok()
        .or_else(|| fenced_block(reply).and_then(|inner| serde_json::from_str(inner).ok()))?;

    let list = match value {
        Value::Object(mut map) => match map.remove(COMMIT_ENVELOPE_KEY) {
            Some(Value::Array(items)) => items,
            Some(_) => return None,
            None => {
                // Some models pick their own key; take the first array of entries.
                let array = map
                    .values()
                    .find(|v| {
                        v.as_array().is_some_and(|a| {
                            !a.is_empty() && a.iter().all(|e| e.is_object() || e.is_string())
                        })
                    })
                    .cloned();
                match array {
                    Some(Value::Array(items)) => items,
                    _ if map.contains_key("title") => vec![Value::Object(map)],
                    _ => return None,
                }
            }
        },
        Value::Array(items) => items,
        _ => return None,
    };

    Some(
        list.into_iter()
            .filter_map(|item| match item {
                Value::String(title) => Some(RawCandidate {
                    title: Some(title),
                    value: None,
                }),
                other => serde_json::from_value::<RawCandidate>(other).ok(),
            })
            .collect(),
    )
}

/// Inner text of the first ```` ``` ```` fenced block, language tag dropped.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Turn a free-form review reply into exactly one candidate.
pub fn sanitize_review(reply: &str) -> Candidate {
    let text = strip_outer_fence(reply.trim());

    let mut lines = text.lines();
    let first = lines
        .by_ref()
        .find(|l| !l.trim().is_empty())
        .map(clean_heading)
        .unwrap_or_default();

    let rest = lines.collect::<Vec<_>>().join("\n");
    let body = strip_outer_fence(rest.trim()).trim().to_string();

    if first.is_empty() {
        return Candidate {
            title: REVIEW_LABEL.to_string(),
            body,
        };
    }

    Candidate { title: first, body }
}

/// Drop a fence that wraps the whole text (```` ```markdown ... ``` ````).
fn strip_outer_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.trim_end().strip_suffix("```") else {
        return text;
    };
    match inner.find('\n') {
        Some(i) => inner[i + 1..].trim(),
        None => inner.trim(),
    }
}

fn clean_heading(line: &str) -> String {
    line.trim()
        .trim_start_matches('#')
        .trim()
        .trim_matches('*')
        .trim()
        .to_string()
}

/// Best-effort JSON recovery from an error body.
///
/// Strict parse first; otherwise the first balanced `{...}` or `[...]` region
/// that parses, looking only at the first 64 KiB and the first few opening
/// brackets. When nothing can be recovered a generic
/// `{"error": {"message": "Unknown error"}}` is returned so the caller always
/// has something to classify.
pub fn extract_json_from_error(body: &str) -> (Value, bool) {
    if let Ok(value) = serde_json::from_str::<Value>(body.trim()) {
        return (value, false);
    }

    let scanned = scan_window(body);
    let starts = scanned
        .char_indices()
        .filter(|&(_, ch)| ch == '{' || ch == '[')
        .take(MAX_SCAN_STARTS);

    for (start, _) in starts {
        if let Some(region) = balanced_region(&scanned[start..])
            && let Ok(value) = serde_json::from_str::<Value>(region)
        {
            return (value, false);
        }
    }

    (json!({ "error": { "message": "Unknown error" } }), true)
}

/// Leading part of `body` the fallback scan may look at, cut on a char boundary.
fn scan_window(body: &str) -> &str {
    if body.len() <= MAX_ERROR_SCAN_BYTES {
        return body;
    }
    let mut end = MAX_ERROR_SCAN_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// Prefix of `text` (which starts with `{` or `[`) whose brackets balance,
/// ignoring brackets inside JSON string literals.
fn balanced_region(text: &str) -> Option<&str> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape_next = false;

    for (idx, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => stack.push(ch),
            '}' | ']' if !in_string => {
                let open = stack.pop()?;
                if (open == '{') != (ch == '}') {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&text[..=idx]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Pull a human-readable message out of whatever shape the backend used.
pub fn error_message(value: &Value) -> Option<String> {
    let candidates = [
        value.pointer("/error/message"),
        value.get("error").filter(|v| v.is_string()),
        value.get("message").filter(|v| v.is_string()),
        value.get("detail").filter(|v| v.is_string()),
        value.pointer("/detail/0/msg"),
        value.pointer("/0/error/message"),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().map(str::trim).filter(|s| !s.is_empty()))
        .map(str::to_string)
}

/// Build the error for a non-2xx response.
pub fn backend_error(status: u16, body: &str) -> GenerationError {
    if body.trim().is_empty() {
        return GenerationError::Backend {
            status,
            message: format!("Request failed with status code {status}"),
            malformed: false,
        };
    }

    let (value, synthesized) = extract_json_from_error(body);
    let message = error_message(&value).unwrap_or_else(|| "Unknown error".to_string());

    GenerationError::Backend {
        status,
        message: format!("HTTP {status}: {message}"),
        malformed: synthesized,
    }
}
