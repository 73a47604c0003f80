pub mod history;
pub mod migrate;
pub mod unlock;
pub mod validate;

use anyhow::Context as _;
use esm_core::config::{has_errors, Config, ConfigWarning, WarnLevel};
use esm_core::HttpTransport;
use std::path::PathBuf;

/// Global flags shared by every command.
pub struct Context {
    pub config_path: PathBuf,
    pub identifier: Option<String>,
    pub migrations_dir: Option<PathBuf>,
    pub json: bool,
}

impl Context {
    /// Load the config file and apply command-line overrides.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(&self.config_path).with_context(|| {
            format!("failed to load config from {}", self.config_path.display())
        })?;
        if let Some(identifier) = &self.identifier {
            config.identifier = identifier.clone();
        }
        if let Some(dir) = &self.migrations_dir {
            config.migrations_dir = dir.clone();
        }
        Ok(config)
    }

    /// Load and validate the config, failing on any error-level finding.
    pub fn checked_config(&self) -> anyhow::Result<Config> {
        let config = self.load_config()?;
        let warnings = config.validate();
        for w in warnings.iter().filter(|w| w.level == WarnLevel::Warning) {
            tracing::warn!("{}", w.message);
        }
        if has_errors(&warnings) {
            anyhow::bail!("invalid config: {}", error_messages(&warnings).join("; "));
        }
        Ok(config)
    }
}

pub fn connect(config: &Config) -> anyhow::Result<HttpTransport> {
    HttpTransport::new(&config.elasticsearch).context("failed to set up elasticsearch client")
}

fn error_messages(warnings: &[ConfigWarning]) -> Vec<&str> {
    warnings
        .iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message.as_str())
        .collect()
}
