//! Host configuration
//!
//! - [`types`]: the host configuration tree
//! - [`loader`]: figment-based loading (defaults, TOML file, environment)
//! - [`source`]: the per-module configuration view handed to services

pub mod loader;
pub mod source;
pub mod types;

pub use loader::ConfigLoader;
pub use source::{FigmentConfigScope, FigmentConfigSource};
pub use types::{HostConfig, LoggingConfig, ModulesConfig, SecretsConfig, VaultConfig};
