//! Configuration loading and validation for Prism.
//!
//! Prism reads an optional `prism.yaml` with one section per adapter. The
//! file is looked up in the current directory unless `--config` names one;
//! without a file every setting takes its default.
//!
//! # Environment Variable Overrides
//!
//! Environment variables win over file values:
//! - `CODEX_PATH`, `GEMINI_PATH`: CLI binaries
//! - `GEMINI_API_KEY` (fallback `GOOGLE_API_KEY`), `GEMINI_MODEL`
//! - `MOONSHOT_API_KEY`, `MOONSHOT_API_BASE`, `KIMI_MODEL`
//! - `SNOWFLAKE_ACCOUNT`, `SNOWFLAKE_USER`, `SNOWFLAKE_PRIVATE_KEY_PATH`,
//!   `SNOWFLAKE_ROLE`, `SNOWFLAKE_DATABASE`, `SNOWFLAKE_SCHEMA_PREFIX`
//!
//! Empty variables count as unset.

use prism_adapters::cortex::{self, CortexDomain, CortexSettings};
use prism_adapters::kimi::KimiSettings;
use prism_adapters::{codex, gemini, kimi};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "prism.yaml";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read the configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse the YAML configuration.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root configuration structure for `prism.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrismConfig {
    pub codex: CodexConfig,
    pub gemini: GeminiConfig,
    pub kimi: KimiConfig,
    pub cortex: CortexConfig,
}

/// Codex CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodexConfig {
    /// Path to the `codex` binary (if it is not in PATH).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Default timeout for `codex_exec` in milliseconds.
    pub exec_timeout_ms: u64,
}

impl Default for CodexConfig {
    fn default() -> Self {
        Self {
            path: None,
            exec_timeout_ms: codex::EXEC_TIMEOUT_MS,
        }
    }
}

impl CodexConfig {
    /// The binary to spawn: configured path or bare `codex`.
    pub fn binary(&self) -> String {
        binary_or(&self.path, "codex")
    }
}

/// How the Gemini adapter reaches Gemini.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GeminiMode {
    /// Spawn the `gemini` CLI.
    #[default]
    Cli,
    /// Call the generative-language REST API.
    Api,
}

/// Gemini settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub mode: GeminiMode,

    /// Path to the `gemini` binary (CLI mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// CLI timeout in milliseconds.
    pub timeout_ms: u64,

    /// API key (API mode). Prefer the environment over the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API base URL (API mode).
    pub api_base: String,

    /// Default model (API mode).
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            mode: GeminiMode::default(),
            path: None,
            timeout_ms: gemini::CLI_TIMEOUT_MS,
            api_key: None,
            api_base: gemini::DEFAULT_API_BASE.to_string(),
            model: gemini::DEFAULT_API_MODEL.to_string(),
        }
    }
}

impl GeminiConfig {
    /// The binary to spawn: configured path or bare `gemini`.
    pub fn binary(&self) -> String {
        binary_or(&self.path, "gemini")
    }
}

/// Kimi settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KimiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
}

impl Default for KimiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: kimi::DEFAULT_API_BASE.to_string(),
            model: kimi::DEFAULT_MODEL.to_string(),
        }
    }
}

impl KimiConfig {
    pub fn settings(&self) -> KimiSettings {
        KimiSettings {
            api_key: self.api_key.clone(),
            api_base: self.api_base.clone(),
            model: self.model.clone(),
        }
    }
}

/// Snowflake Cortex settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CortexConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// PEM private key (PKCS#8 or PKCS#1) registered for `user`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    pub database: String,
    pub schema_prefix: String,

    /// Overrides `https://<account>.snowflakecomputing.com`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Domain picked when no keyword matches.
    pub default_domain: String,

    /// Routable domains, in tie-breaking order.
    pub domains: Vec<CortexDomain>,
}

impl Default for CortexConfig {
    fn default() -> Self {
        Self {
            account: None,
            user: None,
            private_key_path: None,
            role: None,
            database: cortex::DEFAULT_DATABASE.to_string(),
            schema_prefix: cortex::DEFAULT_SCHEMA_PREFIX.to_string(),
            base_url: None,
            default_domain: cortex::DEFAULT_DOMAIN.to_string(),
            domains: cortex::default_domains(),
        }
    }
}

impl CortexConfig {
    pub fn settings(&self) -> CortexSettings {
        CortexSettings {
            account: self.account.clone(),
            user: self.user.clone(),
            private_key_path: self.private_key_path.clone(),
            role: self.role.clone(),
            database: self.database.clone(),
            schema_prefix: self.schema_prefix.clone(),
            base_url: self.base_url.clone(),
            domains: self.domains.clone(),
            default_domain: self.default_domain.clone(),
        }
    }
}

fn binary_or(path: &Option<PathBuf>, fallback: &str) -> String {
    path.as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

impl PrismConfig {
    /// Load `path`, or `./prism.yaml` if it exists, or the defaults.
    ///
    /// Environment overrides are applied in every case.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            return Self::load_from_path(default_path);
        }

        tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
        Self::parse("", |key| env::var(key).ok())
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        tracing::debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse(&content, |key| env::var(key).ok())
    }

    /// Parse YAML and finish it with overrides from `lookup`.
    ///
    /// `lookup` stands in for the process environment.
    pub fn parse(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config: PrismConfig = if content.trim().is_empty() {
            PrismConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };

        config.apply_env_overrides(lookup);
        config.expand_paths()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(path) = var("CODEX_PATH") {
            self.codex.path = Some(PathBuf::from(path));
        }

        if let Some(path) = var("GEMINI_PATH") {
            self.gemini.path = Some(PathBuf::from(path));
        }
        if let Some(key) = var("GEMINI_API_KEY").or_else(|| var("GOOGLE_API_KEY")) {
            self.gemini.api_key = Some(key);
        }
        if let Some(model) = var("GEMINI_MODEL") {
            self.gemini.model = model;
        }

        if let Some(key) = var("MOONSHOT_API_KEY") {
            self.kimi.api_key = Some(key);
        }
        if let Some(base) = var("MOONSHOT_API_BASE") {
            self.kimi.api_base = base;
        }
        if let Some(model) = var("KIMI_MODEL") {
            self.kimi.model = model;
        }

        if let Some(account) = var("SNOWFLAKE_ACCOUNT") {
            self.cortex.account = Some(account);
        }
        if let Some(user) = var("SNOWFLAKE_USER") {
            self.cortex.user = Some(user);
        }
        if let Some(path) = var("SNOWFLAKE_PRIVATE_KEY_PATH") {
            self.cortex.private_key_path = Some(PathBuf::from(path));
        }
        if let Some(role) = var("SNOWFLAKE_ROLE") {
            self.cortex.role = Some(role);
        }
        if let Some(database) = var("SNOWFLAKE_DATABASE") {
            self.cortex.database = database;
        }
        if let Some(prefix) = var("SNOWFLAKE_SCHEMA_PREFIX") {
            self.cortex.schema_prefix = prefix;
        }
    }

    /// Expand `~` in paths to the home directory.
    fn expand_paths(&mut self) -> Result<(), ConfigError> {
        for path in [
            &mut self.codex.path,
            &mut self.gemini.path,
            &mut self.cortex.private_key_path,
        ]
        .into_iter()
        .flatten()
        {
            *path = expand_home(path)?;
        }
        Ok(())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.codex.exec_timeout_ms == 0 || self.gemini.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Timeouts must be greater than zero".into(),
            ));
        }

        let domains = &self.cortex.domains;
        if domains.is_empty() {
            return Err(ConfigError::ValidationError(
                "cortex.domains must list at least one domain".into(),
            ));
        }

        let mut seen = HashSet::new();
        for domain in domains {
            if domain.name.is_empty() || domain.schema.is_empty() {
                return Err(ConfigError::ValidationError(
                    "Every cortex domain needs a name and a schema".into(),
                ));
            }
            if !seen.insert(domain.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate cortex domain '{}'",
                    domain.name
                )));
            }
        }

        if !seen.contains(self.cortex.default_domain.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Default domain '{}' is not one of: {}",
                self.cortex.default_domain,
                domains
                    .iter()
                    .map(|d| d.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        Ok(())
    }
}

fn expand_home(path: &Path) -> Result<PathBuf, ConfigError> {
    let Some(text) = path.to_str() else {
        return Ok(path.to_path_buf());
    };
    if text != "~" && !text.starts_with("~/") {
        return Ok(path.to_path_buf());
    }

    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::ValidationError("Cannot determine home directory".into())
    })?;
    Ok(match text.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => home,
    })
}
