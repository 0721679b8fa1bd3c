//! Configuration loading.
//!
//! Settings come from an optional TOML file (default `./config/rag.toml`).
//! A missing file means "use the built-in defaults"; a file that exists but
//! fails to parse or validate is an error. A handful of environment
//! variables are applied on top:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `MODEL_NAME` | overrides `llm.model` |
//! | `VECTOR_STORE_DIR` | overrides `store.persist_dir` |
//! | `USE_FAKE_LLM` | `"0"` disables the fake chain, any other value enables it |
//!
//! The API key is never read from this file. It is resolved separately by
//! [`CredentialResolver`](crate::credentials::CredentialResolver) and stored
//! in [`Config::api_key`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::credentials::{ApiKey, CredentialResolver};
use crate::error::ConfigError;

pub const ENV_MODEL_NAME: &str = "MODEL_NAME";
pub const ENV_STORE_DIR: &str = "VECTOR_STORE_DIR";
pub const ENV_USE_FAKE_LLM: &str = "USE_FAKE_LLM";

/// Read-only view of environment variables.
///
/// Production code uses [`ProcessEnv`]; tests pass a `HashMap`.
pub trait Environment {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Exactly `"0"` disables fake mode; anything else (or absence) leaves it on.
pub fn parse_fake_flag(value: Option<&str>) -> bool {
    value.map(|v| v != "0").unwrap_or(true)
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default = "default_fake_llm")]
    pub fake_llm: bool,
    /// Filled in by [`Config::resolve_credential`]; never deserialized.
    #[serde(skip)]
    pub api_key: Option<ApiKey>,
}

fn default_fake_llm() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialsConfig {
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,
    #[serde(default = "default_env_var")]
    pub env_var: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            key_file: default_key_file(),
            env_file: default_env_file(),
            env_var: default_env_var(),
        }
    }
}

impl CredentialsConfig {
    /// The fatal error for "no credential in any of these places".
    pub fn missing_error(&self) -> ConfigError {
        ConfigError::MissingCredential {
            var: self.env_var.clone(),
            key_file: self.key_file.display().to_string(),
            env_file: self.env_file.display().to_string(),
        }
    }
}

fn default_key_file() -> PathBuf {
    PathBuf::from("openai.json")
}
fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}
fn default_env_var() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub rag_temperature: f32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_temperature(),
            rag_temperature: 0.0,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            preview_chars: default_preview_chars(),
        }
    }
}

fn default_k() -> usize {
    2
}
fn default_preview_chars() -> usize {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub persist_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            persist_dir: None,
        }
    }
}

fn default_collection() -> String {
    "demo_collection".to_string()
}

impl Config {
    /// Built-in defaults, as if an empty config file had been loaded.
    pub fn minimal() -> Self {
        Self {
            credentials: CredentialsConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            store: StoreConfig::default(),
            fake_llm: default_fake_llm(),
            api_key: None,
        }
    }

    /// Apply `MODEL_NAME`, `VECTOR_STORE_DIR` and `USE_FAKE_LLM`.
    pub fn apply_env_overrides(&mut self, env: &dyn Environment) {
        if let Some(model) = env.var(ENV_MODEL_NAME).filter(|m| !m.trim().is_empty()) {
            self.llm.model = model.trim().to_string();
        }
        if let Some(dir) = env.var(ENV_STORE_DIR).filter(|d| !d.trim().is_empty()) {
            self.store.persist_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = env.var(ENV_USE_FAKE_LLM) {
            self.fake_llm = parse_fake_flag(Some(&flag));
        }
    }

    /// Run the credential resolver and store the result in `api_key`.
    pub fn resolve_credential(&mut self, env: &dyn Environment) -> Option<&ApiKey> {
        let resolver = CredentialResolver::from_config(&self.credentials);
        self.api_key = resolver.resolve_with(env).map(|c| c.key);
        self.api_key.as_ref()
    }

    /// The credential, or the fatal configuration error explaining where
    /// it was looked for.
    pub fn require_api_key(&self) -> Result<&ApiKey, ConfigError> {
        self.api_key
            .as_ref()
            .ok_or_else(|| self.credentials.missing_error())
    }
}

/// Parse and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields [`Config::minimal`].
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::minimal());
    }
    load_config(path)
}

/// Full startup sequence: file, env overrides, credential.
pub fn load_runtime_config(path: &Path, env: &dyn Environment) -> Result<Config> {
    let mut config = load_config_or_default(path)?;
    config.apply_env_overrides(env);
    validate(&config)?;
    config.resolve_credential(env);
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.retrieval.k == 0 {
        return Err(ConfigError::Invalid("retrieval.k must be >= 1".into()));
    }
    if config.embedding.batch_size == 0 {
        return Err(ConfigError::Invalid(
            "embedding.batch_size must be >= 1".into(),
        ));
    }
    if !(0.0..=2.0).contains(&config.llm.temperature)
        || !(0.0..=2.0).contains(&config.llm.rag_temperature)
    {
        return Err(ConfigError::Invalid(
            "llm temperatures must be in [0.0, 2.0]".into(),
        ));
    }
    if config.llm.model.trim().is_empty() {
        return Err(ConfigError::Invalid("llm.model must not be empty".into()));
    }
    if config.store.collection.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "store.collection must not be empty".into(),
        ));
    }
    Ok(())
}
