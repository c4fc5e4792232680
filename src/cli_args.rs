use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::llm::ProviderKind;
use crate::llm::prompt_builder::CommitType;

/// CLI options
#[derive(Parser, Debug)]
#[command(
    name = "aic2",
    version,
    about = "LLM-assisted Git commit message and code review generator"
)]
pub struct Cli {
    /// Backend to ask (defaults to the config file's `provider`, then openai)
    #[arg(long, short = 'p', value_enum, global = true)]
    pub provider: Option<ProviderKind>,

    /// Model name to use (e.g. mistral-small-latest)
    #[arg(long, short = 'm', global = true)]
    pub model: Option<String>,

    /// API key (otherwise uses the backend's <NAME>_API_KEY env var)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Base URL of the backend, e.g. http://localhost:11434
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// How many commit message candidates to request
    #[arg(long, short = 'g', global = true)]
    pub generate: Option<u8>,

    /// Language of the generated text (e.g. en, de, ja)
    #[arg(long, short = 'l', global = true)]
    pub locale: Option<String>,

    /// Commit title convention
    #[arg(long = "type", short = 't', value_enum, global = true)]
    pub commit_type: Option<CommitType>,

    /// Include the commit body in the selectable value
    #[arg(long, global = true)]
    pub include_body: bool,

    /// Ask the backend to stream its reply (OpenAI and Ollama)
    #[arg(long, global = true)]
    pub stream: bool,

    /// Read the diff from a file instead of `git diff --cached`
    #[arg(long, global = true)]
    pub diff_file: Option<PathBuf>,

    /// Config file (defaults to ~/.config/aic2.toml)
    #[arg(long, global = true, env = "AIC2_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write an audit log of the prompt and reply
    #[arg(long, global = true)]
    pub log: bool,

    /// Exit non-zero when the backend fails instead of printing an error item
    #[arg(long, global = true)]
    pub strict: bool,

    /// Print the display items as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Write the first commit candidate into .git/COMMIT_EDITMSG (no commit is created)
    #[arg(long, global = true)]
    pub apply: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand (e.g. 'review')
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands, e.g. `aic2 review`
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Ask for a code review of the staged diff instead of commit messages
    Review,
}
