//! Loaded units
//!
//! A unit's exported instances are materialized on first request, at most
//! once per concrete exported type. Concurrent first requests wait for the
//! single construction and share its outcome.

use std::any::TypeId;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, error, info};

use modhost_domain::{Error, Result};

use crate::lifecycle::unload::panic_message;
use crate::module::Module;
use crate::ports::loader::IsolationContext;
use crate::services::descriptor::{Constructed, ServiceBlueprint};
use crate::services::factory;
use crate::services::ServiceCatalog;

type InstanceCell = Arc<OnceLock<Result<Constructed>>>;

/// A unit file loaded into an isolation context
pub struct LoadedUnit {
    path: PathBuf,
    unit_name: String,
    exports: ServiceCatalog,
    context: Mutex<Option<Box<dyn IsolationContext>>>,
    instances: Mutex<HashMap<TypeId, InstanceCell>>,
    unloaded: AtomicBool,
}

impl LoadedUnit {
    pub(crate) fn new(path: PathBuf, context: Box<dyn IsolationContext>) -> Self {
        Self {
            unit_name: context.unit_name().to_string(),
            exports: context.exports().clone(),
            path,
            context: Mutex::new(Some(context)),
            instances: Mutex::new(HashMap::new()),
            unloaded: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    /// Blueprints the unit exports
    pub fn exports(&self) -> &ServiceCatalog {
        &self.exports
    }

    pub fn is_unloaded(&self) -> bool {
        self.unloaded.load(Ordering::Acquire)
    }

    /// Number of exported types materialized so far
    pub fn materialized(&self) -> usize {
        self.lock_instances()
            .values()
            .filter(|cell| matches!(cell.get(), Some(Ok(_))))
            .count()
    }

    /// The single exported concrete type providing `C`
    pub fn find_exported_concrete_type<C: ?Sized + 'static>(
        &self,
    ) -> Result<Arc<dyn ServiceBlueprint>> {
        self.exports.find_concrete_for::<C>()
    }

    /// The unit's instance of the exported type providing `C`
    pub fn instance<C: ?Sized + Send + Sync + 'static>(&self, module: &Module) -> Result<Arc<C>> {
        self.materialize::<C>(module)?.project::<C>()
    }

    pub(crate) fn materialize<C: ?Sized + 'static>(&self, module: &Module) -> Result<Constructed> {
        if self.is_unloaded() {
            return Err(Error::invalid_state(format!(
                "unit '{}' at {} has been unloaded",
                self.unit_name,
                self.path.display()
            )));
        }

        let blueprint = self.find_exported_concrete_type::<C>()?;
        let cell = Arc::clone(
            self.lock_instances()
                .entry(blueprint.concrete_type())
                .or_default(),
        );

        cell.get_or_init(|| {
            debug!(unit = %self.unit_name, service = blueprint.type_name(), "Materializing exported type");
            let _construction = module.coordinator().begin_construction(blueprint.type_name())?;
            let constructed = factory::construct(blueprint.as_ref(), module)?;
            // The unit disposes its own instances on unload.
            factory::wire(module, &constructed, false)?;
            Ok(constructed)
        })
        .clone()
    }

    /// Dispose materialized instances, then release the isolation context
    ///
    /// Returns `false` when the unit was already unloaded.
    pub(crate) fn unload(&self) -> bool {
        if self.unloaded.swap(true, Ordering::AcqRel) {
            return false;
        }

        let instances: Vec<InstanceCell> = self.lock_instances().drain().map(|(_, cell)| cell).collect();
        for cell in instances {
            let Some(Ok(constructed)) = cell.get() else {
                continue;
            };
            if let Some(disposable) = &constructed.capabilities.disposable {
                let disposable = Arc::clone(disposable);
                if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| disposable.dispose())) {
                    error!(
                        unit = %self.unit_name,
                        service = constructed.type_name,
                        panic = %panic_message(panic.as_ref()),
                        "Disposer panicked"
                    );
                }
            }
        }

        let context = self
            .context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(context) = context {
            context.release();
        }

        info!(unit = %self.unit_name, path = %self.path.display(), "Unit unloaded");
        true
    }

    fn lock_instances(&self) -> std::sync::MutexGuard<'_, HashMap<TypeId, InstanceCell>> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LoadedUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedUnit")
            .field("path", &self.path)
            .field("unit_name", &self.unit_name)
            .field("exports", &self.exports)
            .field("unloaded", &self.is_unloaded())
            .finish_non_exhaustive()
    }
}
