//! Domain ports
//!
//! Narrow interfaces through which the runtime consumes external
//! collaborators. Implementations live in the infrastructure crate (or in
//! tests).

pub mod config;
pub mod secrets;

pub use config::{ConfigScope, ConfigScopeExt, ConfigSource};
pub use secrets::VaultClient;
