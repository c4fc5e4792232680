use std::sync::Arc;
use std::time::Duration;

use aic2::audit::AuditLogger;
use aic2::cli_args::{Cli, Command};
use aic2::config::Config;
use aic2::llm::http::ReqwestInvoker;
use aic2::llm::{DiffPayload, Mode, build_adapter};
use aic2::pipeline::{self, DisplayItem, Generation, RequestContext};
use aic2::{git, logging};
use anyhow::{Context, Result, anyhow};
use chrono::Local;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

fn spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn print_items(items: &[DisplayItem], json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(items).context("failed to encode display items")?;
        println!("{out}");
        return Ok(());
    }

    for item in items {
        if item.is_error {
            println!("{}", item.name.red().bold());
            continue;
        }

        println!("{}", item.name.bold());
        if !item.description.is_empty() {
            for line in item.description.lines() {
                println!("    {}", line.dimmed());
            }
        }
        println!();
    }
    Ok(())
}

fn apply(generation: &Generation, items: &[DisplayItem]) -> Result<()> {
    if generation.mode != Mode::Commit {
        log::warn!("--apply only applies to commit messages; ignoring");
        return Ok(());
    }

    if let Some(first) = items.iter().find(|i| !i.is_error) {
        let path = git::write_commit_editmsg(&first.value)?;
        println!("Wrote commit message to {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    let cfg = Config::from_sources(&cli)?;

    let diff = match &cli.diff_file {
        Some(path) => git::diff_from_file(path)?,
        None => git::staged_diff()?,
    };
    if diff.trim().is_empty() {
        println!("No staged changes found.");
        return Ok(());
    }

    let mode = match cli.command {
        Some(Command::Review) => Mode::Review,
        None => Mode::Commit,
    };
    let payload = DiffPayload::new(diff, mode);

    let audit = cfg.logging.then(|| AuditLogger::new(&cfg.logs_dir));
    let ctx = RequestContext {
        prompt: &cfg.prompt,
        config: &cfg.provider_config,
        audit: audit.as_ref(),
        started_at: Local::now().naive_local(),
    };

    let adapter = build_adapter(cfg.provider, Arc::new(ReqwestInvoker::new()));

    let bar = spinner(format!(
        "Asking {} ({}) for a {}...",
        cfg.provider.display_name(),
        cfg.provider_config.model,
        mode.as_str()
    ));
    let generation = pipeline::run(adapter.as_ref(), &payload, &ctx);
    bar.finish_and_clear();

    let items: Vec<DisplayItem> = generation.items().collect();
    print_items(&items, cli.json)?;

    if cli.apply && !generation.is_error() {
        apply(&generation, &items)?;
    }

    if cli.strict
        && let Err(err) = generation.into_result()
    {
        return Err(anyhow!(err).context(format!("{} failed", cfg.provider.display_name())));
    }

    Ok(())
}
