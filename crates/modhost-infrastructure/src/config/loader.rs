//! Configuration loader
//!
//! Sources are merged in this order (later sources override earlier):
//! 1. Default values from `HostConfig::default()`
//! 2. TOML configuration file (explicit path, else the first default location found)
//! 3. Environment variables with the `MODHOST_` prefix, `__` between nested keys
//!    (e.g. `MODHOST_LOGGING__LEVEL=debug`)

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use std::env;
use std::path::{Path, PathBuf};

use modhost_domain::{Error, Result};

use crate::config::HostConfig;
use crate::constants::{
    CONFIG_ENV_PREFIX, CONFIG_ENV_SEPARATOR, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILENAME,
};
use crate::error_ext::ErrorContext;
use crate::logging::{log_config_loaded, parse_log_level};

/// Configuration loader service
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Configuration file path
    config_path: Option<PathBuf>,

    /// Environment prefix
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader with default settings
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: CONFIG_ENV_PREFIX.to_string(),
        }
    }

    /// Set the configuration file path
    #[must_use]
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix
    #[must_use]
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Get the configured file path
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Load and validate the host configuration
    ///
    /// An explicit configuration path that does not exist is an error; the
    /// default locations are optional.
    pub fn load(&self) -> Result<HostConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(HostConfig::default()));

        if let Some(config_path) = &self.config_path {
            if !config_path.exists() {
                log_config_loaded(config_path, false);
                return Err(Error::configuration(format!(
                    "configuration file not found: {}",
                    config_path.display()
                )));
            }
            figment = figment.merge(Toml::file(config_path));
            log_config_loaded(config_path, true);
        } else if let Some(default_path) = Self::find_default_config_path() {
            figment = figment.merge(Toml::file(&default_path));
            log_config_loaded(&default_path, true);
        }

        figment = figment.merge(Env::prefixed(&self.env_prefix).split(CONFIG_ENV_SEPARATOR));

        let config: HostConfig = figment
            .extract()
            .config_context("Failed to extract configuration")?;

        validate_host_config(&config)?;
        Ok(config)
    }

    /// Serialize a configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, config: &HostConfig, path: P) -> Result<()> {
        let toml_string =
            toml::to_string_pretty(config).config_context("Failed to serialize config to TOML")?;
        std::fs::write(path.as_ref(), toml_string).io_context("Failed to write config file")?;
        Ok(())
    }

    /// First existing default configuration file
    fn find_default_config_path() -> Option<PathBuf> {
        let current_dir = env::current_dir().ok()?;

        let candidates = [
            Some(current_dir.join(DEFAULT_CONFIG_FILENAME)),
            Some(
                current_dir
                    .join(DEFAULT_CONFIG_DIR)
                    .join(DEFAULT_CONFIG_FILENAME),
            ),
            dirs::config_dir().map(|d| d.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILENAME)),
        ];

        candidates.into_iter().flatten().find(|path| path.exists())
    }
}

/// Validate host configuration
fn validate_host_config(config: &HostConfig) -> Result<()> {
    parse_log_level(&config.logging.level)?;
    config.lifecycle.validate()?;
    validate_modules_config(config)?;
    validate_secrets_config(config)?;
    Ok(())
}

fn validate_modules_config(config: &HostConfig) -> Result<()> {
    if config.modules.search_paths.is_empty() {
        return Err(Error::configuration(
            "modules.search_paths must name at least one directory",
        ));
    }
    Ok(())
}

fn validate_secrets_config(config: &HostConfig) -> Result<()> {
    let Some(vault) = &config.secrets.vault else {
        return Ok(());
    };
    if !(vault.address.starts_with("http://") || vault.address.starts_with("https://")) {
        return Err(Error::configuration(format!(
            "secrets.vault.address must be an http(s) URL, got '{}'",
            vault.address
        )));
    }
    if vault.token_env.is_empty() {
        return Err(Error::configuration("secrets.vault.token_env cannot be empty"));
    }
    if vault.timeout_secs == 0 {
        return Err(Error::configuration("secrets.vault.timeout_secs cannot be 0"));
    }
    Ok(())
}
