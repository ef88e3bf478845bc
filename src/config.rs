//! Runtime configuration.
//!
//! A [`Config`] is built once at startup from built-in defaults, an optional
//! JSON file and command-line overrides, then handed by reference to every
//! component that needs it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// File consulted when no `--config` path is given
pub const DEFAULT_CONFIG_PATH: &str = "config/arquebus.json";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Narrative service settings
    pub ai: AiConfig,
    /// Result-log extraction settings
    pub metrics: MetricsConfig,
    /// Directory layout of the host
    pub platform: PlatformProfile,
    /// Report synthesis settings
    pub report: ReportConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Narrative service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Identity of the provider to call
    pub provider: String,
    /// Known providers keyed by identity
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Overall timeout for one call, in seconds
    pub timeout_secs: u64,
    /// Retry policy for transient failures
    pub retry: RetryConfig,
    /// Language the narrative should be written in
    pub language: String,
}

/// One OpenAI-compatible chat-completions provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Full URL of the chat-completions endpoint
    pub endpoint: String,
    /// Bearer credential; empty means "not configured"
    pub api_key: String,
    /// Model identifier
    pub model: String,
}

/// Retry policy for the narrative service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds
    pub initial_backoff_ms: u64,
    /// Growth factor applied to the delay after each retry
    pub multiplier: f64,
}

/// What to do with a record whose timestamp cannot be parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadTimestampPolicy {
    /// Exclude the record and count it
    #[default]
    Drop,
    /// Keep the record, stamped with the current wall-clock time
    SubstituteNow,
}

/// Result-log extraction settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub bad_timestamp: BadTimestampPolicy,
}

/// Directory layout of the host.
///
/// Paths are relative to the working directory unless configured otherwise.
/// Components receive the resolved profile and never inspect the OS.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformProfile {
    /// Where generated reports and summaries live
    pub reports_dir: PathBuf,
    /// Where raw result logs live
    pub results_dir: PathBuf,
    /// Extension of result logs
    pub result_extension: String,
}

/// Report synthesis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Test duration assumed when TPS has to be scraped from rendered HTML
    pub fallback_duration_secs: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Output format: compact, full or json
    pub format: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert(
            "deepseek".to_string(),
            ProviderConfig::new("https://api.deepseek.com/v1/chat/completions", "deepseek-chat"),
        );
        providers.insert(
            "qianwen".to_string(),
            ProviderConfig::new(
                "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions",
                "qwen-plus",
            ),
        );
        providers.insert(
            "moon".to_string(),
            ProviderConfig::new("https://api.moonshot.cn/v1/chat/completions", "moonshot-v1-8k"),
        );
        providers.insert(
            "yunwu".to_string(),
            ProviderConfig::new(
                "https://ark.cn-shanghai.volces.com/api/v3/chat/completions",
                "skylark-lite",
            ),
        );

        Self {
            provider: "deepseek".to_string(),
            providers,
            max_tokens: 2000,
            temperature: 0.7,
            timeout_secs: 60,
            retry: RetryConfig::default(),
            language: "English".to_string(),
        }
    }
}

impl ProviderConfig {
    fn new(endpoint: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key: String::new(),
            model: model.to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 2000,
            multiplier: 2.0,
        }
    }
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("reports"),
            results_dir: PathBuf::from("results"),
            result_extension: "jtl".to_string(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            fallback_duration_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
}

impl Config {
    /// Load configuration from `path`, or from [`DEFAULT_CONFIG_PATH`] when
    /// it exists. A missing default file is not an error; a missing
    /// explicit file is.
    ///
    /// Runs before logging is installed, so it does not log; the file read
    /// is recorded in [`Config::source`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        if !path.exists() {
            if required {
                return Err(Error::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let mut config = Self::from_json_str(&text)?;
        config.source = Some(path);
        Ok(config)
    }

    /// Build a configuration from a JSON document layered over the defaults
    pub fn from_json_str(text: &str) -> Result<Self> {
        let overlay: Value = serde_json::from_str(text)?;
        if !overlay.is_object() {
            return Err(Error::config("config root must be a JSON object"));
        }

        let mut merged = serde_json::to_value(Self::default())?;
        merge_json(&mut merged, overlay);
        Ok(serde_json::from_value(merged)?)
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(provider) = overrides.provider {
            self.ai.provider = provider;
        }
        if let Some(key) = overrides.api_key {
            self.ai
                .providers
                .entry(self.ai.provider.clone())
                .or_default()
                .api_key = key;
        }
        if let Some(timeout) = overrides.timeout {
            self.ai.timeout_secs = timeout.as_secs().max(1);
        }
    }

    /// The provider selected by `ai.provider`
    pub fn selected_provider(&self) -> Result<&ProviderConfig> {
        self.ai.providers.get(&self.ai.provider).ok_or_else(|| {
            Error::config(format!("provider '{}' is not configured", self.ai.provider))
        })
    }
}

/// Merge `overlay` into `base`: objects merge key by key, anything else
/// replaces the base value.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
