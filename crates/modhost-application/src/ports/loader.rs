//! Unit loader port
//!
//! A unit is an externally packaged set of service implementations. Each
//! platform provides a [`UnitLoader`] that turns a unit file into an
//! [`IsolationContext`]; the runtime only ever sees the exported catalog.

use std::path::Path;

use modhost_domain::Result;

use crate::loader::DependencyResolver;
use crate::services::ServiceCatalog;

/// A loaded unit's isolation boundary
pub trait IsolationContext: Send + Sync {
    /// Name the unit was registered under
    fn unit_name(&self) -> &str;

    /// Blueprints of every type the unit exports
    fn exports(&self) -> &ServiceCatalog;

    /// Release platform resources held for the unit
    ///
    /// Called once, after every instance materialized from the unit has been
    /// disposed.
    fn release(&self) {}
}

/// Loads unit files into isolation contexts
pub trait UnitLoader: Send + Sync {
    /// Load the unit at `path`, resolving its dependencies through `resolver`
    fn load(&self, path: &Path, resolver: &DependencyResolver) -> Result<Box<dyn IsolationContext>>;

    /// Loader name for diagnostics
    fn loader_name(&self) -> &str;
}
