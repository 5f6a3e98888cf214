//! Application ports
//!
//! - [`capabilities`]: lifecycle contracts a service may implement
//! - [`loader`]: platform unit loading
//! - [`registry`]: link-time registries of units and module entries

pub mod capabilities;
pub mod loader;
pub mod registry;

pub use capabilities::{AsyncConfigurable, BackgroundWork, Capabilities, Disposable};
pub use loader::{IsolationContext, UnitLoader};
