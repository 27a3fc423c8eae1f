//! TOML configuration parsing and validation.
//!
//! Every section except `[db]` is optional and falls back to defaults:
//!
//! ```toml
//! [db]
//! path = "./data/cricket.sqlite"
//!
//! [model]
//! provider = "openai"        # "disabled" | "openai"
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//! timeout_secs = 15
//!
//! [memory]
//! compaction_threshold = 20
//! keep_recent = 5
//! ```
//!
//! The model is only used when `provider = "openai"` **and** the variable
//! named by `api_key_env` is set. Without a credential every model-backed
//! stage runs its deterministic path instead.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub relevancy: RelevancyConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Upper bound for a single completion call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: 0.0,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}

impl ModelConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    /// Turns rendered into the model context.
    #[serde(default = "default_recent_turns")]
    pub recent_turns: usize,
    /// Compaction runs once a user has more turns than this.
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: usize,
    /// Turns left untouched by compaction.
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
    #[serde(default = "default_summary_max_words")]
    pub summary_max_words: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            recent_turns: default_recent_turns(),
            compaction_threshold: default_compaction_threshold(),
            keep_recent: default_keep_recent(),
            summary_max_words: default_summary_max_words(),
        }
    }
}

fn default_recent_turns() -> usize {
    10
}
fn default_compaction_threshold() -> usize {
    20
}
fn default_keep_recent() -> usize {
    5
}
fn default_summary_max_words() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RelevancyConfig {
    /// Keywords added to the built-in cricket vocabulary.
    #[serde(default)]
    pub extra_keywords: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    /// Ask the model to rephrase single-record answers.
    #[serde(default)]
    pub narrate: bool,
    /// Use the plain sentence when narration fails instead of failing the request.
    #[serde(default = "default_true")]
    pub narrate_fallback: bool,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            narrate: false,
            narrate_fallback: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Defaults with the given database path. Used by tests and embedders.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            model: ModelConfig::default(),
            memory: MemoryConfig::default(),
            relevancy: RelevancyConfig::default(),
            answer: AnswerConfig::default(),
            server: ServerConfig::default(),
            log: LogConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Reject configurations the pipeline cannot run with.
pub fn validate(config: &Config) -> Result<()> {
    match config.model.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown model provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.model.is_enabled() {
        if config.model.timeout_secs == 0 {
            anyhow::bail!("model.timeout_secs must be > 0");
        }
        if config.model.model.trim().is_empty() {
            anyhow::bail!("model.model must not be empty when provider is enabled");
        }
        if !(0.0..=2.0).contains(&config.model.temperature) {
            anyhow::bail!("model.temperature must be in [0.0, 2.0]");
        }
    }

    if config.memory.recent_turns == 0 {
        anyhow::bail!("memory.recent_turns must be >= 1");
    }
    if config.memory.keep_recent >= config.memory.compaction_threshold {
        anyhow::bail!("memory.keep_recent must be smaller than memory.compaction_threshold");
    }
    if config.memory.summary_max_words == 0 {
        anyhow::bail!("memory.summary_max_words must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Config {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = parse("[db]\npath = \"./x.sqlite\"\n");
        validate(&cfg).unwrap();
        assert!(!cfg.model.is_enabled());
        assert_eq!(cfg.memory.compaction_threshold, 20);
        assert_eq!(cfg.memory.keep_recent, 5);
        assert_eq!(cfg.memory.recent_turns, 10);
        assert_eq!(cfg.memory.summary_max_words, 200);
        assert!(cfg.answer.narrate_fallback);
        assert_eq!(cfg.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let cfg = parse("[db]\npath = \"x\"\n[model]\nprovider = \"llama\"\n");
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_keep_recent_must_be_below_threshold() {
        let cfg = parse("[db]\npath = \"x\"\n[memory]\ncompaction_threshold = 5\nkeep_recent = 5\n");
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected_when_enabled() {
        let cfg = parse("[db]\npath = \"x\"\n[model]\nprovider = \"openai\"\ntimeout_secs = 0\n");
        assert!(validate(&cfg).is_err());
    }
}
