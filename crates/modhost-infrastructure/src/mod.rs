//! # Infrastructure Layer
//!
//! Technical concerns around the module runtime: how the host is
//! configured, where logs go, how unit files and module directories map to
//! linked code, and how `vault://` secrets are fetched.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | figment host configuration and per-module configuration views |
//! | [`logging`] | Structured logging with tracing |
//! | [`unit_loader`] | Unit manifests bound to link-time unit registrations |
//! | [`vault`] | HTTP KV v2 vault client |
//! | [`host`] | Module discovery, boot and shutdown |
//! | [`constants`] | File names, environment variables, defaults |

pub mod config;
pub mod constants;
pub mod error_ext;
pub mod host;
pub mod logging;
pub mod unit_loader;
pub mod vault;

pub use config::{ConfigLoader, HostConfig};
pub use error_ext::ErrorContext;
pub use host::{DiscoveredModule, ModuleHost, discover_modules};
pub use unit_loader::LinkedUnitLoader;
pub use vault::HttpVaultClient;
