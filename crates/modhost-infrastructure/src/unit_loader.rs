//! Linked unit loader
//!
//! Units are compiled into the host binary and registered in the
//! [`LINKED_UNITS`](modhost_application::ports::registry::LINKED_UNITS)
//! slice. A unit file on disk is a small TOML manifest binding a path to one
//! of those registrations:
//!
//! ```toml
//! unit = "metrics-sink"
//! dependencies = ["collector.toml"]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use modhost_application::ServiceCatalog;
use modhost_application::loader::DependencyResolver;
use modhost_application::ports::registry::find_linked_unit;
use modhost_application::ports::{IsolationContext, UnitLoader};
use modhost_domain::{Error, Result};

use crate::error_ext::ErrorContext;

/// On-disk unit manifest
#[derive(Debug, Clone, Deserialize)]
pub struct UnitManifest {
    /// Registered unit name
    pub unit: String,
    /// Files the unit needs next to it or in a shared dependency path
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl UnitManifest {
    /// Read and parse a manifest file
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .io_context(format!("failed to read unit manifest {}", path.display()))?;
        toml::from_str(&text)
            .config_context(format!("invalid unit manifest {}", path.display()))
    }
}

/// Isolation context of a linked unit
struct LinkedUnit {
    name: String,
    exports: ServiceCatalog,
    dependencies: Vec<PathBuf>,
}

impl IsolationContext for LinkedUnit {
    fn unit_name(&self) -> &str {
        &self.name
    }

    fn exports(&self) -> &ServiceCatalog {
        &self.exports
    }

    fn release(&self) {
        debug!(
            unit = %self.name,
            dependencies = self.dependencies.len(),
            "Linked unit released"
        );
    }
}

/// [`UnitLoader`] binding unit manifests to link-time registrations
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkedUnitLoader;

impl LinkedUnitLoader {
    pub fn new() -> Self {
        Self
    }
}

impl UnitLoader for LinkedUnitLoader {
    fn load(&self, path: &Path, resolver: &DependencyResolver) -> Result<Box<dyn IsolationContext>> {
        let manifest = UnitManifest::read(path)?;

        let dependencies = manifest
            .dependencies
            .iter()
            .map(|dependency| resolver.resolve(&manifest.unit, dependency))
            .collect::<Result<Vec<_>>>()?;

        let entry = find_linked_unit(&manifest.unit).ok_or_else(|| {
            Error::not_found(format!(
                "linked unit '{}' (referenced by {})",
                manifest.unit,
                path.display()
            ))
        })?;
        let exports = (entry.exports)();

        debug!(
            unit = entry.name,
            path = %path.display(),
            exports = exports.len(),
            "Linked unit bound"
        );

        Ok(Box::new(LinkedUnit {
            name: manifest.unit,
            exports,
            dependencies,
        }))
    }

    fn loader_name(&self) -> &str {
        "linked"
    }
}
