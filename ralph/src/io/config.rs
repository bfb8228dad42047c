//! Driver configuration stored as JSON (default `.ralph/config.json`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::budget::Bound;
use crate::core::types::{LogLevel, ToolPermissions};
use crate::io::invoker::DEFAULT_COMMAND;

/// Driver configuration (JSON).
///
/// Exactly one of `timeout` (minutes) or `maxIterations` bounds the loop.
/// Relative paths resolve against the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverConfig {
    /// Requirements document, read once before the loop.
    pub prd: PathBuf,
    /// Progress log, re-read every iteration. May not exist yet.
    pub progress: PathBuf,
    /// Prompt template, read once before the loop.
    pub prompt: PathBuf,
    pub model: String,
    #[serde(default)]
    pub tools: ToolPermissions,
    /// Wall-clock bound in minutes.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub max_iterations: Option<u32>,
    /// Passed verbatim to the tool's `--log-level`; also sets the driver's own verbosity.
    #[serde(default = "default_log_level", rename = "loglevel")]
    pub log_level: String,
    /// External tool binary.
    #[serde(default = "default_command")]
    pub command: String,
}

fn default_command() -> String {
    DEFAULT_COMMAND.to_string()
}

fn default_log_level() -> String {
    LogLevel::default().as_str().to_string()
}

impl DriverConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("prd", &self.prd),
            ("progress", &self.progress),
            ("prompt", &self.prompt),
        ] {
            if path.as_os_str().is_empty() {
                return Err(anyhow!("{name} must be a non-empty path"));
            }
        }
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must be non-empty"));
        }
        if self.command.trim().is_empty() {
            return Err(anyhow!("command must be non-empty"));
        }
        self.bound().map(|_| ())
    }

    /// Level for the driver's own `tracing` output.
    pub fn tracing_level(&self) -> LogLevel {
        LogLevel::parse(&self.log_level)
    }

    /// The configured termination bound.
    pub fn bound(&self) -> Result<Bound> {
        match (self.timeout, self.max_iterations) {
            (Some(_), Some(_)) => Err(anyhow!(
                "set either timeout or maxIterations, not both"
            )),
            (None, None) => Err(anyhow!("one of timeout or maxIterations is required")),
            (Some(0), None) => Err(anyhow!("timeout must be > 0")),
            (None, Some(0)) => Err(anyhow!("maxIterations must be > 0")),
            (Some(minutes), None) => minutes
                .checked_mul(60)
                .map(Duration::from_secs)
                .filter(|budget| Instant::now().checked_add(*budget).is_some())
                .map(Bound::Duration)
                .ok_or_else(|| anyhow!("timeout of {minutes} minutes is too large")),
            (None, Some(max)) => Ok(Bound::Iterations(max)),
        }
    }
}

/// Load and validate config from a JSON file.
pub fn load_config(path: &Path) -> Result<DriverConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DriverConfig =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
