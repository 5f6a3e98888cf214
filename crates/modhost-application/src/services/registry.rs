//! Service Registry
//!
//! Per-module singletons, constructed on first request. The first requester
//! installs a deferred evaluation under a short-held lock; the evaluation
//! itself runs outside the lock, exactly once, and every requester awaits the
//! same shared outcome. Failures are cached and replayed like successes.
//!
//! Lookup order: an entry registered under the requested type, then the one
//! entry whose views provide the requested capability. Several such entries
//! make the request `Ambiguous`. A factory that panics is recorded as a
//! `Construction` failure and replayed like any other.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::debug;

use modhost_domain::{Error, ModuleId, Result};

use crate::lifecycle::unload::panic_message;

use super::views::{ErasedService, ViewTable};

type Evaluation = Shared<BoxFuture<'static, Result<ErasedService>>>;

struct ServiceEntry {
    type_name: &'static str,
    views: ViewTable,
    evaluation: Evaluation,
}

/// Per-module table of lazily constructed singletons
pub struct ServiceRegistry {
    module: ModuleId,
    entries: Mutex<HashMap<TypeId, Arc<ServiceEntry>>>,
}

impl ServiceRegistry {
    pub fn new(module: ModuleId) -> Self {
        Self {
            module,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The singleton for `C`, constructing it with `factory` on first request
    ///
    /// `views` describes the capabilities the constructed instance provides
    /// and is only consulted when this call installs the entry.
    pub async fn get_or_create<C, F, Fut>(&self, views: ViewTable, factory: F) -> Result<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<ErasedService>> + Send + 'static,
    {
        let entry = self.entry_for(TypeId::of::<C>(), type_name::<C>(), views, factory)?;
        let service = entry.evaluation.clone().await?;
        entry.views.project::<C>(&service).ok_or_else(|| {
            Error::internal(format!(
                "registered {} cannot be viewed as {}",
                entry.type_name,
                type_name::<C>()
            ))
        })
    }

    /// Whether an entry exists for `C`, directly or through its views
    pub fn contains<C: ?Sized + 'static>(&self) -> bool {
        let key = TypeId::of::<C>();
        let entries = self.lock_entries();
        entries.contains_key(&key) || entries.values().any(|entry| entry.views.provides(key))
    }

    /// Number of entries, including failed ones
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Drop every entry; returns how many were dropped
    pub fn clear(&self) -> usize {
        let mut entries = self.lock_entries();
        let count = entries.len();
        entries.clear();
        count
    }

    fn entry_for<F, Fut>(
        &self,
        key: TypeId,
        requested: &'static str,
        views: ViewTable,
        factory: F,
    ) -> Result<Arc<ServiceEntry>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<ErasedService>> + Send + 'static,
    {
        let mut entries = self.lock_entries();
        if let Some(existing) = entries.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let mut assignable: Vec<&Arc<ServiceEntry>> = entries
            .values()
            .filter(|entry| entry.views.provides(key))
            .collect();
        match assignable.as_mut_slice() {
            [] => {}
            [existing] => {
                debug!(
                    module = %self.module,
                    requested,
                    registered = existing.type_name,
                    "Reusing assignable service entry"
                );
                return Ok(Arc::clone(*existing));
            }
            several => {
                several.sort_unstable_by_key(|entry| entry.type_name);
                let candidates = several.iter().map(|entry| entry.type_name.to_string()).collect();
                return Err(Error::ambiguous(requested, candidates));
            }
        }

        // Nothing runs until the first requester polls, outside this lock.
        let evaluation = AssertUnwindSafe(async move { factory().await })
            .catch_unwind()
            .map(move |outcome| {
                outcome.unwrap_or_else(|panic| {
                    Err(Error::construction(requested, panic_message(panic.as_ref())))
                })
            })
            .boxed()
            .shared();
        let entry = Arc::new(ServiceEntry {
            type_name: requested,
            views,
            evaluation,
        });
        entries.insert(key, Arc::clone(&entry));
        debug!(module = %self.module, service = requested, "Service entry installed");
        Ok(entry)
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<TypeId, Arc<ServiceEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.lock_entries();
        f.debug_struct("ServiceRegistry")
            .field("module", &self.module)
            .field("entries", &entries.values().map(|e| e.type_name).collect::<Vec<_>>())
            .finish()
    }
}
