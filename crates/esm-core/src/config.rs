use crate::error::{MigrationError, Result};
use crate::orchestrator::MigrationOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "esm.yaml";
pub const DEFAULT_MIGRATIONS_DIR: &str = "es/migration";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ElasticsearchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Base urls, tried in order when a node refuses connections.
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Sent with every request. A name may carry several values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            path_prefix: None,
            username: None,
            password: None,
            headers: BTreeMap::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub identifier: String,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    #[serde(default)]
    pub ignore_previous_failures: bool,
    #[serde(default)]
    pub allow_older_versions: bool,
    #[serde(default = "default_backoff_period_millis")]
    pub backoff_period_millis: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from(DEFAULT_MIGRATIONS_DIR)
}

fn default_backoff_period_millis() -> u64 {
    30_000
}

fn default_retry_count() -> u32 {
    5
}

impl Config {
    pub fn new(identifier: impl Into<String>, urls: Vec<String>) -> Self {
        Self {
            identifier: identifier.into(),
            migrations_dir: default_migrations_dir(),
            ignore_previous_failures: false,
            allow_older_versions: false,
            backoff_period_millis: default_backoff_period_millis(),
            retry_count: default_retry_count(),
            elasticsearch: ElasticsearchConfig {
                urls,
                ..ElasticsearchConfig::default()
            },
        }
    }

    /// Read a config file. A relative `migrations_dir` is resolved against
    /// the directory holding the file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MigrationError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&data)?;
        if cfg.migrations_dir.is_relative() {
            if let Some(base) = path.parent() {
                cfg.migrations_dir = base.join(&cfg.migrations_dir);
            }
        }
        Ok(cfg)
    }

    pub fn options(&self) -> MigrationOptions {
        MigrationOptions {
            identifier: self.identifier.clone(),
            ignore_previous_failures: self.ignore_previous_failures,
            allow_older_versions: self.allow_older_versions,
            backoff_period: Duration::from_millis(self.backoff_period_millis),
            retry_count: self.retry_count,
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let es = &self.elasticsearch;

        if self.identifier.trim().is_empty() {
            warnings.push(ConfigWarning::error("identifier must not be empty"));
        }

        if es.urls.is_empty() {
            warnings.push(ConfigWarning::error("elasticsearch.urls must list at least one url"));
        }
        for url in &es.urls {
            match reqwest::Url::parse(url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => warnings.push(ConfigWarning::error(format!(
                    "elasticsearch url '{url}' has unsupported scheme '{}'",
                    parsed.scheme()
                ))),
                Err(e) => warnings.push(ConfigWarning::error(format!(
                    "elasticsearch url '{url}' is not a valid url: {e}"
                ))),
            }
        }

        if es.password.is_some() && es.username.is_none() {
            warnings.push(ConfigWarning::error(
                "elasticsearch.password is set without elasticsearch.username",
            ));
        }

        if es.timeout_secs == 0 {
            warnings.push(ConfigWarning::error("elasticsearch.timeout_secs must be positive"));
        }

        if self.retry_count == 0 {
            warnings.push(ConfigWarning::warning(
                "retry_count is 0: a held lock fails the run without waiting",
            ));
        }

        warnings
    }
}

/// True when any entry is an error rather than a warning.
pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
    warnings.iter().any(|w| w.level == WarnLevel::Error)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
