//! Runner configuration, read from `.jobrun.toml` by default.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = ".jobrun.toml";

/// Runner configuration (TOML).
///
/// Edited by humans. Missing fields fall back to [`RunnerConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Interpreter prefix for script steps; the script is appended as the last argument.
    pub shell: Vec<String>,

    /// Wall-clock limit for each shell action, in seconds.
    pub command_timeout_secs: u64,

    /// Keep at most this many bytes of stdout (and of stderr) per shell action.
    pub output_limit_bytes: usize,

    pub reporter: ReporterKind,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: vec!["sh".to_string(), "-c".to_string()],
            command_timeout_secs: 30 * 60,
            output_limit_bytes: 100_000,
            reporter: ReporterKind::Auto,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.shell.is_empty() || self.shell[0].trim().is_empty() {
            return Err(anyhow!("shell must be a non-empty array"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// How run progress is rendered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReporterKind {
    /// `github` under GitHub Actions, otherwise `plain`.
    #[default]
    Auto,
    Plain,
    Github,
    Quiet,
}

impl ReporterKind {
    /// Resolve `Auto` using the `GITHUB_ACTIONS` environment variable.
    pub fn resolve(self) -> ReporterKind {
        self.resolve_with(std::env::var_os("GITHUB_ACTIONS").is_some())
    }

    pub fn resolve_with(self, in_github_actions: bool) -> ReporterKind {
        match self {
            ReporterKind::Auto if in_github_actions => ReporterKind::Github,
            ReporterKind::Auto => ReporterKind::Plain,
            other => other,
        }
    }
}

impl fmt::Display for ReporterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReporterKind::Auto => "auto",
            ReporterKind::Plain => "plain",
            ReporterKind::Github => "github",
            ReporterKind::Quiet => "quiet",
        };
        f.write_str(label)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunnerConfig::default()`.
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    if !path.exists() {
        let cfg = RunnerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunnerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
