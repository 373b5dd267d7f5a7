//! Run configuration.
//!
//! A [`Config`] is constructed explicitly and handed to the session and model
//! client. It can be loaded from a JSON file, or seeded from environment
//! variables by the binaries; library code never reads the environment.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::RetryConfig;
use crate::safety::SafetyPolicy;
use crate::settle::SettleConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

/// How many of a turn's requested actions the loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiActionPolicy {
    /// Run only the first action; the rest are logged and dropped.
    #[default]
    FirstOnly,
    /// Run every action in order, capturing an observation after each.
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model name sent to the provider.
    pub model: String,
    /// Provider API base URL (without the `/responses` suffix).
    pub api_base: String,
    pub display_width: u32,
    pub display_height: u32,
    /// Environment label for the computer tool ("linux", "mac", "windows", "browser").
    pub environment: String,
    /// X11 display of the sandbox desktop.
    pub x11_display: String,
    /// Maximum model calls before the run is abandoned.
    pub max_turns: u32,
    pub model_timeout_secs: u64,
    pub sandbox_timeout_secs: u64,
    pub settle: SettleConfig,
    pub multi_action: MultiActionPolicy,
    pub safety: SafetyPolicy,
    /// When set, every observation is written here as `step-NNNN.png`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_dir: Option<PathBuf>,
    pub max_retries: u32,
    pub max_retry_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "computer-use-preview".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            display_width: 1024,
            display_height: 768,
            environment: "linux".to_string(),
            x11_display: ":99".to_string(),
            max_turns: 50,
            model_timeout_secs: 180,
            sandbox_timeout_secs: 30,
            settle: SettleConfig::default(),
            multi_action: MultiActionPolicy::default(),
            safety: SafetyPolicy::default(),
            screenshot_dir: None,
            max_retries: 3,
            max_retry_secs: 120,
        }
    }
}

/// Parse a numeric variable. Unparseable or out-of-range values are ignored.
fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid number", key, raw);
            None
        }
    }
}

impl Config {
    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults overridden by `DESKPILOT_*` environment variables and `DISPLAY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();
        if let Some(v) = lookup("DESKPILOT_MODEL") {
            config.model = v;
        }
        if let Some(v) = lookup("DESKPILOT_API_BASE") {
            config.api_base = v;
        }
        if let Some(v) = lookup("DESKPILOT_ENVIRONMENT") {
            config.environment = v;
        }
        if let Some(v) = lookup("DISPLAY") {
            config.x11_display = v;
        }
        if let Some(v) = lookup("DESKPILOT_SCREENSHOT_DIR") {
            config.screenshot_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = parse_var(&lookup, "DESKPILOT_DISPLAY_WIDTH") {
            config.display_width = v;
        }
        if let Some(v) = parse_var(&lookup, "DESKPILOT_DISPLAY_HEIGHT") {
            config.display_height = v;
        }
        if let Some(v) = parse_var(&lookup, "DESKPILOT_MAX_TURNS") {
            config.max_turns = v;
        }
        if let Some(v) = parse_var(&lookup, "DESKPILOT_SETTLE_MS") {
            config.settle = SettleConfig::Fixed { delay_ms: v };
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display_width == 0 || self.display_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "display size must be non-zero, got {}x{}",
                self.display_width, self.display_height
            )));
        }
        if self.max_turns == 0 {
            return Err(ConfigError::Invalid("max_turns must be at least 1".into()));
        }
        if self.model_timeout_secs == 0 || self.sandbox_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        Ok(())
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_secs(self.sandbox_timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            max_retry_duration: Duration::from_secs(self.max_retry_secs),
            ..RetryConfig::default()
        }
    }
}
