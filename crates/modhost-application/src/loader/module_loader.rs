//! Module loader
//!
//! Keeps one [`LoadedUnit`] per canonical unit path for the lifetime of a
//! module. Loading a file is synchronous; instances are materialized lazily.
//! The platform loader runs outside the unit table lock, so a slow load only
//! holds up callers waiting for the same path.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::{debug, info};

use modhost_domain::{Error, Result};

use crate::module::Module;
use crate::ports::loader::UnitLoader;

use super::resolver::DependencyResolver;
use super::unit::LoadedUnit;

type UnitCell = Arc<OnceLock<Result<Arc<LoadedUnit>>>>;

/// Per-module table of loaded units
pub struct ModuleLoader {
    loader: Option<Arc<dyn UnitLoader>>,
    shared_paths: Vec<PathBuf>,
    units: DashMap<PathBuf, UnitCell>,
}

impl ModuleLoader {
    /// Loader loading units through `loader`, with host-shared dependency paths
    pub fn new(loader: Option<Arc<dyn UnitLoader>>, shared_paths: Vec<PathBuf>) -> Self {
        Self {
            loader,
            shared_paths,
            units: DashMap::new(),
        }
    }

    /// Load the unit at `path`, or return the already loaded unit
    ///
    /// Concurrent first loads of one path share a single platform load. A
    /// failed load is reported to its waiters and retried by later calls.
    pub fn load(&self, path: &Path) -> Result<Arc<LoadedUnit>> {
        if !path.exists() {
            return Err(Error::not_found(format!("unit file {}", path.display())));
        }
        let canonical = path
            .canonicalize()
            .map_err(|e| Error::io_with_source(format!("canonicalize {}", path.display()), e))?;

        let cell: UnitCell = Arc::clone(self.units.entry(canonical.clone()).or_default().value());
        let outcome = cell.get_or_init(|| self.load_unit(&canonical)).clone();
        if outcome.is_err() {
            self.units
                .remove_if(&canonical, |_, current| Arc::ptr_eq(current, &cell));
        }
        outcome
    }

    fn load_unit(&self, canonical: &Path) -> Result<Arc<LoadedUnit>> {
        let loader = self.loader.as_ref().ok_or_else(|| {
            Error::invalid_state(format!(
                "no unit loader configured to load {}",
                canonical.display()
            ))
        })?;
        let unit_dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
        let resolver = DependencyResolver::new(unit_dir, self.shared_paths.clone());

        debug!(path = %canonical.display(), loader = loader.loader_name(), "Loading unit");
        let context = loader.load(canonical, &resolver)?;
        let unit = Arc::new(LoadedUnit::new(canonical.to_path_buf(), context));
        info!(
            unit = unit.unit_name(),
            path = %unit.path().display(),
            exports = unit.exports().len(),
            "Unit loaded"
        );
        Ok(unit)
    }

    /// The unit's instance of the exported type providing `C`
    pub fn resolve<C: ?Sized + Send + Sync + 'static>(
        &self,
        path: &Path,
        module: &Module,
    ) -> Result<Arc<C>> {
        self.load(path)?.instance::<C>(module)
    }

    /// Unload one unit; `false` when it was not loaded
    pub fn unload(&self, path: &Path) -> bool {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.units
            .remove(&key)
            .is_some_and(|(_, cell)| unload_cell(&cell))
    }

    /// Unload every unit; returns how many were unloaded
    pub fn unload_all(&self) -> usize {
        let paths: Vec<PathBuf> = self.units.iter().map(|entry| entry.key().clone()).collect();
        paths
            .into_iter()
            .filter_map(|path| self.units.remove(&path))
            .filter(|(_, cell)| unload_cell(cell))
            .count()
    }

    /// Canonical paths of loaded units
    pub fn loaded_units(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .units
            .iter()
            .filter(|entry| matches!(entry.value().get(), Some(Ok(_))))
            .map(|entry| entry.key().clone())
            .collect();
        paths.sort();
        paths
    }
}

fn unload_cell(cell: &UnitCell) -> bool {
    match cell.get() {
        Some(Ok(unit)) => unit.unload(),
        _ => false,
    }
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("loader", &self.loader.as_ref().map(|l| l.loader_name().to_string()))
            .field("shared_paths", &self.shared_paths)
            .field("units", &self.loaded_units())
            .finish()
    }
}
