//! Content-addressed record of every prompt/reply exchange.
//!
//! File names are `aic2[_review]_<YYYY-MM-DD>_<HH-mm-ss>_<xxh64>.log`, so the
//! same diff and mode within one second always map to the same file. A second
//! write to an existing file puts the new block on top of the old content.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use xxhash_rust::xxh64::xxh64;

use crate::llm::Mode;

/// Writes audit logs into one directory. Only built when logging is enabled.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    dir: PathBuf,
}

/// 64-bit xxHash (seed 0) of the diff as 16 lowercase hex digits.
pub fn content_hash(diff: &str) -> String {
    format!("{:016x}", xxh64(diff.as_bytes(), 0))
}

pub fn file_name(now: NaiveDateTime, diff: &str, mode: Mode) -> String {
    let prefix = match mode {
        Mode::Commit => "aic2",
        Mode::Review => "aic2_review",
    };
    format!(
        "{prefix}_{}_{}.log",
        now.format("%Y-%m-%d_%H-%M-%S"),
        content_hash(diff)
    )
}

impl AuditLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        AuditLogger { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one exchange and return the file it landed in.
    pub fn record(
        &self,
        backend: &str,
        diff: &str,
        system_prompt: &str,
        reply: &str,
        mode: Mode,
        now: NaiveDateTime,
    ) -> Result<PathBuf> {
        let path = self.dir.join(file_name(now, diff, mode));
        let block = format!("[{backend}]\n- Response\n{reply}\n\n- System Prompt\n{system_prompt}\n\n");

        let tail = if path.exists() {
            fs::read_to_string(&path)
                .with_context(|| format!("failed to read existing log {}", path.display()))?
        } else {
            format!("[Git Diff]\n{diff}")
        };

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create log directory {}", self.dir.display()))?;
        fs::write(&path, format!("{block}{tail}"))
            .with_context(|| format!("failed to write log {}", path.display()))?;

        log::debug!("Wrote audit log {}", path.display());
        Ok(path)
    }
}
