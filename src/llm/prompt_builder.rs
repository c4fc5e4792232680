use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::Mode;
use super::parser::COMMIT_ENVELOPE_KEY;
use super::prompts;
use crate::error::GenerationError;

/// Commit title convention requested from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CommitType {
    #[default]
    Conventional,
    Gitmoji,
    /// No convention.
    #[serde(rename = "")]
    #[value(name = "none")]
    Plain,
}

/// Resolved prompt settings for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptOptions {
    pub locale: String,
    pub max_length: usize,
    pub commit_type: CommitType,
    pub generate: u8,
    pub system_prompt: Option<String>,
    pub system_prompt_path: Option<PathBuf>,
    pub code_review_prompt_path: Option<PathBuf>,
}

impl Default for PromptOptions {
    fn default() -> Self {
        PromptOptions {
            locale: "en".to_string(),
            max_length: 50,
            commit_type: CommitType::Conventional,
            generate: 1,
            system_prompt: None,
            system_prompt_path: None,
            code_review_prompt_path: None,
        }
    }
}

/// Render the system prompt for `mode`.
///
/// A configured override replaces the generated text verbatim. For commits the
/// prompt file wins over the inline prompt; reviews only honor the review file.
pub fn build_prompt(options: &PromptOptions, mode: Mode) -> Result<String, GenerationError> {
    match mode {
        Mode::Commit => {
            if let Some(path) = &options.system_prompt_path {
                return read_prompt_file(path);
            }
            if let Some(inline) = options.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
                return Ok(inline.to_string());
            }
            Ok(commit_prompt(options))
        }
        Mode::Review => {
            if let Some(path) = &options.code_review_prompt_path {
                return read_prompt_file(path);
            }
            Ok(review_prompt(options))
        }
    }
}

fn read_prompt_file(path: &Path) -> Result<String, GenerationError> {
    log::debug!("Using prompt override from {}", path.display());
    fs::read_to_string(path).map_err(|source| GenerationError::PromptFile {
        path: path.display().to_string(),
        source,
    })
}

fn commit_prompt(options: &PromptOptions) -> String {
    let generate = options.generate.max(1);
    let mut system = prompts::COMMIT_INSTRUCTIONS.to_owned();

    match options.commit_type {
        CommitType::Conventional => {
            system.push_str("\n\n");
            system.push_str(prompts::CONVENTIONAL_TYPES);
        }
        CommitType::Gitmoji => {
            system.push_str("\n\n");
            system.push_str(prompts::GITMOJI_TYPES);
        }
        CommitType::Plain => {}
    }

    system.push_str(&format!(
        "\n\nWrite in the language identified by the locale \"{locale}\".\n\
         Keep every title at most {max_length} characters.\n\
         Generate exactly {generate} distinct candidate commit message{plural}.\n\
         Reply with a single JSON object and nothing else, shaped exactly like:\n\
         {{\"{key}\": [{{\"title\": \"<commit title>\", \"value\": \"<full commit message>\"}}]}}\n\
         The \"{key}\" array must contain {generate} item{plural}.",
        locale = options.locale,
        max_length = options.max_length,
        generate = generate,
        plural = if generate == 1 { "" } else { "s" },
        key = COMMIT_ENVELOPE_KEY,
    ));

    system
}

fn review_prompt(options: &PromptOptions) -> String {
    let mut system = prompts::REVIEW_INSTRUCTIONS.to_owned();
    system.push_str(&format!(
        "\nWrite the review in the language identified by the locale \"{}\".",
        options.locale
    ));
    system
}
