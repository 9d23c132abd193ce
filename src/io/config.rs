//! Session configuration stored under `.tsforge/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Session configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Model identifier sent to the chat-completion service.
    pub model: String,

    /// Output token budget per generation request.
    pub max_tokens: u32,

    /// Base URL of the chat-completion API.
    pub api_base: String,

    /// Seconds to sleep before retrying after a service-overload signal.
    pub overload_retry_delay_secs: u64,

    /// Maximum overload retries per generation request.
    pub overload_retry_limit: u32,

    /// Regeneration attempts when the service returns output without a
    /// single well-formed fenced code block.
    pub parse_retry_limit: u32,

    /// Upper bound on failing iterations, regardless of continuation policy.
    pub max_iterations: u32,

    /// Timeout for scaffold/install child processes, in seconds.
    pub command_timeout_secs: u64,

    /// Timeout for a test run, in seconds.
    pub test_timeout_secs: u64,

    /// Truncate captured child-process output beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            api_base: "https://api.openai.com/v1".to_string(),
            overload_retry_delay_secs: 10,
            overload_retry_limit: 30,
            parse_retry_limit: 3,
            max_iterations: 10,
            command_timeout_secs: 600,
            test_timeout_secs: 600,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must be non-empty"));
        }
        if self.max_tokens == 0 {
            return Err(anyhow!("max_tokens must be > 0"));
        }
        if self.api_base.trim().is_empty() {
            return Err(anyhow!("api_base must be non-empty"));
        }
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.command_timeout_secs == 0 || self.test_timeout_secs == 0 {
            return Err(anyhow!("timeouts must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SessionConfig::default()`.
pub fn load_config(path: &Path) -> Result<SessionConfig> {
    if !path.exists() {
        let cfg = SessionConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SessionConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SessionConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
