//! Host configuration types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use modhost_application::LifecycleSettings;

use crate::constants::{
    DEFAULT_LOG_LEVEL, DEFAULT_MODULES_DIR, DEFAULT_VAULT_TOKEN_ENV, VAULT_REQUEST_TIMEOUT_SECS,
};

/// Root of the host configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub logging: LoggingConfig,
    pub modules: ModulesConfig,
    pub lifecycle: LifecycleSettings,
    pub secrets: SecretsConfig,
    /// Host-wide service sections, visible to every module
    pub services: Map<String, Value>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON output format
    pub json_format: bool,

    /// Log to a daily-rolling file in addition to stdout
    pub file_output: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json_format: false,
            file_output: None,
        }
    }
}

/// Where modules and their shared dependencies live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// Directories scanned for module directories; also the asset fallback
    pub search_paths: Vec<PathBuf>,

    /// Directories probed for unit dependencies after the unit's own
    pub shared_dependency_paths: Vec<PathBuf>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            search_paths: vec![PathBuf::from(DEFAULT_MODULES_DIR)],
            shared_dependency_paths: Vec::new(),
        }
    }
}

/// Secret backends
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Vault server for `vault://` references; none disables the scheme
    pub vault: Option<VaultConfig>,
}

/// Vault server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Base address, e.g. `https://vault.internal:8200`
    pub address: String,

    /// Environment variable holding the access token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_token_env() -> String {
    DEFAULT_VAULT_TOKEN_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    VAULT_REQUEST_TIMEOUT_SECS
}
