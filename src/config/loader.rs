//! Configuration loading from disk.

use std::path::Path;
use std::fs;
use crate::config::schema::PodpingConfig;
use crate::config::validation::{validate_config, ConfigIssue};

/// Environment variable naming the broadcasting account.
pub const ACCOUNT_ENV_VAR: &str = "PODPING_HIVE_ACCOUNT";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ConfigIssue>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<PodpingConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<PodpingConfig, ConfigError> {
    let config: PodpingConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment overrides using the given lookup.
///
/// Only the account is taken from the environment here; the posting key is
/// read by the signer itself and never enters the config.
pub fn apply_env_overrides<F>(config: &mut PodpingConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(account) = lookup(ACCOUNT_ENV_VAR).filter(|a| !a.trim().is_empty()) {
        config.writer.account = account.trim().to_string();
    }
}

/// Load the file if given, otherwise defaults, then apply process env overrides.
pub fn load_or_default(path: Option<&Path>) -> Result<PodpingConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => PodpingConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}
