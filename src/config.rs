use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use crate::cli_args::Cli;
use crate::llm::prompt_builder::{CommitType, PromptOptions};
use crate::llm::{ProviderConfig, ProviderKind};

/// Final resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderKind,
    pub prompt: PromptOptions,
    pub provider_config: ProviderConfig,
    pub logging: bool,
    pub logs_dir: PathBuf,
}

/// Settings that may appear at the top level or in a `[providers.<name>]` table.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub host: Option<String>,
    pub path: Option<String>,
    pub key: Option<String>,
    pub auth: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Milliseconds.
    pub timeout: Option<u64>,
    pub proxy: Option<String>,
    pub stream: Option<bool>,
    pub include_body: Option<bool>,
    pub num_ctx: Option<u32>,
}

impl ProviderSection {
    /// Fields set in `self` win over `fallback`.
    fn or(self, fallback: &ProviderSection) -> ProviderSection {
        let fallback = fallback.clone();
        ProviderSection {
            host: self.host.or(fallback.host),
            path: self.path.or(fallback.path),
            key: self.key.or(fallback.key),
            auth: self.auth.or(fallback.auth),
            model: self.model.or(fallback.model),
            temperature: self.temperature.or(fallback.temperature),
            top_p: self.top_p.or(fallback.top_p),
            max_tokens: self.max_tokens.or(fallback.max_tokens),
            timeout: self.timeout.or(fallback.timeout),
            proxy: self.proxy.or(fallback.proxy),
            stream: self.stream.or(fallback.stream),
            include_body: self.include_body.or(fallback.include_body),
            num_ctx: self.num_ctx.or(fallback.num_ctx),
        }
    }
}

/// Shape of `~/.config/aic2.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub provider: Option<String>,
    pub locale: Option<String>,
    pub max_length: Option<usize>,
    #[serde(rename = "type")]
    pub commit_type: Option<CommitType>,
    pub generate: Option<u8>,
    pub system_prompt: Option<String>,
    pub system_prompt_path: Option<PathBuf>,
    pub code_review_prompt_path: Option<PathBuf>,
    pub logging: Option<bool>,
    pub logs_dir: Option<PathBuf>,
    #[serde(flatten)]
    pub shared: ProviderSection,
    pub providers: BTreeMap<String, ProviderSection>,
}

impl Config {
    /// Build the final config from CLI flags, environment, TOML file, and defaults.
    ///
    /// Precedence:
    ///   1. CLI flags
    ///   2. Env vars (`<PROVIDER>_API_KEY`, `AIC2_MODEL`)
    ///   3. TOML `[providers.<name>]` table
    ///   4. TOML top-level keys
    ///   5. Built-in defaults
    pub fn from_sources(cli: &Cli) -> Result<Self> {
        let file_cfg = match &cli.config {
            Some(path) => load_file_config(path)?,
            None => match config_path() {
                Some(path) if path.exists() => load_file_config(&path)?,
                _ => FileConfig::default(),
            },
        };

        Self::resolve(cli, file_cfg, |name| env::var(name).ok())
    }

    /// Merge already-loaded sources; `lookup_env` stands in for the process environment.
    pub fn resolve(
        cli: &Cli,
        file_cfg: FileConfig,
        lookup_env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let provider = match (cli.provider, file_cfg.provider.as_deref()) {
            (Some(kind), _) => kind,
            (None, Some(name)) => ProviderKind::from_name(name)
                .ok_or_else(|| anyhow!("unknown provider {name:?} in config file"))?,
            (None, None) => ProviderKind::OpenAi,
        };

        let section = file_cfg
            .providers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(provider.as_str()))
            .map(|(_, s)| s.clone())
            .unwrap_or_default()
            .or(&file_cfg.shared);

        let defaults = ProviderConfig::for_kind(provider);
        let env_key = provider.key_env().and_then(&lookup_env);

        let key = cli
            .api_key
            .clone()
            .or(env_key)
            .or(section.key)
            .unwrap_or_default();

        if let Some(var) = provider.key_env()
            && key.trim().is_empty()
        {
            bail!(
                "{} API key is required: set {var}, pass --api-key, or add `key` under [providers.{}]",
                provider.display_name(),
                provider.as_str()
            );
        }

        let model = cli
            .model
            .clone()
            .or_else(|| lookup_env("AIC2_MODEL"))
            .or(section.model)
            .unwrap_or(defaults.model);

        let provider_config = ProviderConfig {
            host: cli.host.clone().or(section.host).unwrap_or(defaults.host),
            path: section.path,
            key,
            auth: section.auth.unwrap_or(defaults.auth),
            model,
            temperature: section.temperature.unwrap_or(defaults.temperature),
            top_p: section.top_p.unwrap_or(defaults.top_p),
            max_tokens: section.max_tokens.unwrap_or(defaults.max_tokens),
            timeout: section
                .timeout
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
            proxy: section.proxy.filter(|p| !p.trim().is_empty()),
            stream: cli.stream || section.stream.unwrap_or(defaults.stream),
            include_body: cli.include_body || section.include_body.unwrap_or(defaults.include_body),
            num_ctx: section.num_ctx.unwrap_or(defaults.num_ctx),
        };

        let prompt_defaults = PromptOptions::default();
        let prompt = PromptOptions {
            locale: cli
                .locale
                .clone()
                .or(file_cfg.locale)
                .unwrap_or(prompt_defaults.locale),
            max_length: file_cfg.max_length.unwrap_or(prompt_defaults.max_length),
            commit_type: cli
                .commit_type
                .or(file_cfg.commit_type)
                .unwrap_or(prompt_defaults.commit_type),
            generate: cli
                .generate
                .or(file_cfg.generate)
                .unwrap_or(prompt_defaults.generate)
                .max(1),
            system_prompt: file_cfg.system_prompt,
            system_prompt_path: file_cfg.system_prompt_path,
            code_review_prompt_path: file_cfg.code_review_prompt_path,
        };

        let logs_dir = file_cfg
            .logs_dir
            .or_else(default_logs_dir)
            .unwrap_or_else(|| PathBuf::from("aic2-logs"));

        Ok(Config {
            provider,
            prompt,
            provider_config,
            logging: cli.log || file_cfg.logging.unwrap_or(false),
            logs_dir,
        })
    }
}

/// Return `~/.config/aic2.toml`
fn config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".config").join("aic2.toml"))
}

fn default_logs_dir() -> Option<PathBuf> {
    Some(dirs::data_local_dir()?.join("aic2").join("logs"))
}

pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_file_config(&data).with_context(|| format!("invalid config file {}", path.display()))
}

pub fn parse_file_config(data: &str) -> Result<FileConfig> {
    Ok(toml::from_str::<FileConfig>(data)?)
}
