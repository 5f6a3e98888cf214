//! Unit loading
//!
//! - [`resolver`]: dependency and asset lookup
//! - [`unit`]: a loaded unit and its lazily materialized exports
//! - [`module_loader`]: the per-module table of loaded units

pub mod module_loader;
pub mod resolver;
pub mod unit;

pub use module_loader::ModuleLoader;
pub use resolver::{AssetResolver, DependencyResolver};
pub use unit::LoadedUnit;
