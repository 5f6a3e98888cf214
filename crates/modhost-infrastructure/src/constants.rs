//! Infrastructure layer constants
//!
//! Contains constants that are part of the infrastructure implementation.
//! Domain-specific constants are defined in `modhost_domain::constants`.

// ============================================================================
// CONFIGURATION CONSTANTS
// ============================================================================

/// Default configuration file name
pub const DEFAULT_CONFIG_FILENAME: &str = "modhost.toml";

/// Default configuration directory name
pub const DEFAULT_CONFIG_DIR: &str = "modhost";

/// Environment variable prefix for configuration
pub const CONFIG_ENV_PREFIX: &str = "MODHOST_";

/// Separator between nested keys in environment variable names
pub const CONFIG_ENV_SEPARATOR: &str = "__";

// ============================================================================
// LOGGING CONSTANTS
// ============================================================================

/// Environment variable overriding the configured log filter
pub const LOG_FILTER_ENV: &str = "MODHOST_LOG";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// File stem used when the configured log path has none
pub const DEFAULT_LOG_FILE_STEM: &str = "modhost";

// ============================================================================
// MODULE LAYOUT CONSTANTS
// ============================================================================

/// Manifest file marking a module directory
pub const MODULE_MANIFEST_FILENAME: &str = "module.toml";

/// Table of the module manifest overlaid onto the host configuration
pub const MODULE_CONFIG_TABLE: &str = "config";

/// Default module search directory, relative to the working directory
pub const DEFAULT_MODULES_DIR: &str = "modules";

// ============================================================================
// VAULT CONSTANTS
// ============================================================================

/// Environment variable holding the vault token by default
pub const DEFAULT_VAULT_TOKEN_ENV: &str = "VAULT_TOKEN";

/// Header carrying the vault token
pub const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";

/// Vault request timeout in seconds
pub const VAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
