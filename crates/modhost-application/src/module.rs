//! Module handle
//!
//! A [`Module`] is a cheaply cloneable handle to everything one loaded module
//! owns: its configuration view, singleton registry, service factory, unit
//! loader, secrets and unload coordinator.
//!
//! ```rust,ignore
//! let module = Module::builder("billing", "/srv/modules/billing")
//!     .catalog(catalog)
//!     .config(Arc::new(source))
//!     .build()?;
//!
//! let ledger = module.service::<dyn Ledger>().await?;
//! // ...
//! module.unload().await?;
//! ```

use std::any::{TypeId, type_name};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use modhost_domain::ports::{ConfigSource, VaultClient};
use modhost_domain::{Error, ModuleId, Result};

use crate::config::JsonConfigSource;
use crate::lifecycle::{DrainReport, LifecycleSettings, UnloadCoordinator};
use crate::loader::{AssetResolver, ModuleLoader};
use crate::ports::capabilities::Capabilities;
use crate::ports::loader::UnitLoader;
use crate::secrets::{SecretStore, SecretValue};
use crate::services::descriptor::Constructed;
use crate::services::factory::{self, root_cause};
use crate::services::{ErasedService, ServiceCatalog, ServiceFactory, ServiceRegistry, ViewTable};

struct ModuleInner {
    id: ModuleId,
    root: PathBuf,
    config: Arc<dyn ConfigSource>,
    settings: LifecycleSettings,
    coordinator: UnloadCoordinator,
    registry: ServiceRegistry,
    factory: ServiceFactory,
    loader: ModuleLoader,
    assets: AssetResolver,
    secrets: SecretStore,
}

/// Handle to a loaded module
#[derive(Clone)]
pub struct Module {
    inner: Arc<ModuleInner>,
}

impl Module {
    /// Start building a module rooted at `root`
    pub fn builder(id: impl Into<ModuleId>, root: impl Into<PathBuf>) -> ModuleBuilder {
        ModuleBuilder::new(id.into(), root.into())
    }

    pub fn id(&self) -> &ModuleId {
        &self.inner.id
    }

    /// Module root directory
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Configuration view (host settings with the module overlay)
    pub fn config(&self) -> &dyn ConfigSource {
        self.inner.config.as_ref()
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.inner.settings
    }

    pub fn coordinator(&self) -> &UnloadCoordinator {
        &self.inner.coordinator
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.inner.registry
    }

    pub fn factory(&self) -> &ServiceFactory {
        &self.inner.factory
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.inner.loader
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.inner.secrets
    }

    // ========================================================================
    // Services
    // ========================================================================

    /// The module singleton providing `C`
    ///
    /// Constructed on first request from the single catalog blueprint that
    /// provides `C`. Concurrent first requests share one construction.
    pub async fn service<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>> {
        let registry = &self.inner.registry;
        match self.inner.factory.catalog().find_concrete_for::<C>() {
            Ok(blueprint) => {
                let views = blueprint.views().clone();
                let module = self.clone();
                registry
                    .get_or_create::<C, _, _>(views, move || async move {
                        let service = blueprint.type_name();
                        tokio::task::spawn_blocking(move || {
                            module
                                .inner
                                .factory
                                .build(blueprint.as_ref(), &module)
                                .map(|constructed| constructed.instance)
                        })
                        .await
                        .map_err(|e| Error::construction(service, format!("constructor did not complete: {e}")))?
                    })
                    .await
            }
            Err(resolution) => {
                registry
                    .get_or_create::<C, _, _>(ViewTable::default(), move || async move {
                        Err::<ErasedService, _>(resolution)
                    })
                    .await
            }
        }
    }

    /// [`service`](Self::service) for synchronous call sites
    ///
    /// Runs the lookup as a separate task on the module runtime and blocks
    /// only the calling thread.
    pub fn service_blocking<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>> {
        let module = self.clone();
        crate::blocking::block_on(self.inner.coordinator.handle(), async move {
            module.service::<C>().await
        })?
    }

    /// The module singleton of type `T`, constructed by `factory` on first
    /// request
    ///
    /// When the catalog registers `T`, the singleton also answers requests
    /// for every capability the registration provides.
    pub async fn get_or_create<T, F, Fut>(&self, factory: F) -> Result<Arc<T>>
    where
        T: Capabilities,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let views = self
            .inner
            .factory
            .catalog()
            .by_concrete_type(TypeId::of::<T>())
            .map_or_else(ViewTable::for_concrete::<T>, |blueprint| blueprint.views().clone());
        let instance_views = views.clone();
        let module = self.clone();

        self.inner
            .registry
            .get_or_create::<T, _, _>(views, move || async move {
                let service = type_name::<T>();
                let _construction = module.coordinator().begin_construction(service)?;
                let instance = factory().await.map_err(|e| root_cause(&e, service))?;
                let constructed = Constructed::new(service, Arc::new(instance), instance_views);
                factory::wire(&module, &constructed, true)?;
                Ok::<_, Error>(constructed.instance)
            })
            .await
    }

    /// A fresh, unshared instance of the type providing `C`
    pub fn create_service<C: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<C>> {
        self.inner.factory.create::<C>(self)
    }

    /// The module singleton for `C`, materialized from the unit at `path`
    pub async fn service_from_unit<C: ?Sized + Send + Sync + 'static>(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Arc<C>> {
        let unit = self.inner.loader.load(path.as_ref())?;
        let blueprint = unit.find_exported_concrete_type::<C>()?;
        let views = blueprint.views().clone();
        let module = self.clone();

        self.inner
            .registry
            .get_or_create::<C, _, _>(views, move || async move {
                let service = blueprint.type_name();
                tokio::task::spawn_blocking(move || {
                    unit.materialize::<C>(&module)
                        .map(|constructed| constructed.instance)
                })
                .await
                .map_err(|e| Error::construction(service, format!("constructor did not complete: {e}")))?
            })
            .await
    }

    /// The unit's own instance of the exported type providing `C`
    pub fn resolve_unit<C: ?Sized + Send + Sync + 'static>(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Arc<C>> {
        self.inner.loader.resolve::<C>(path.as_ref(), self)
    }

    /// Locate a module asset file
    pub fn resolve_asset(&self, name: &str) -> Result<PathBuf> {
        self.inner.assets.resolve(name)
    }

    // ========================================================================
    // Secrets
    // ========================================================================

    pub fn fetch_secret(&self, name: &str) -> Result<Option<SecretValue>> {
        self.inner.secrets.fetch_secret(name)
    }

    pub async fn fetch_secret_async(&self, name: &str) -> Result<Option<SecretValue>> {
        self.inner.secrets.fetch_secret_async(name).await
    }

    pub fn with_secret<F, R>(&self, name: &str, action: F) -> Result<Option<R>>
    where
        F: FnOnce(&[u8]) -> R,
    {
        self.inner.secrets.with_secret(name, action)
    }

    // ========================================================================
    // Unload
    // ========================================================================

    /// Request unload; `true` for the call that performed the transition
    pub fn signal_unload(&self) -> bool {
        self.inner.coordinator.signal()
    }

    /// Wait for every observed task, then run disposers
    pub async fn drain(&self) -> Result<DrainReport> {
        self.inner.coordinator.drain().await
    }

    /// Signal, drain, then release units and singletons
    pub async fn unload(&self) -> Result<DrainReport> {
        self.signal_unload();
        let report = self.drain().await?;
        let units = self.inner.loader.unload_all();
        let services = self.inner.registry.clear();
        info!(module = %self.inner.id, units, services, "Module unloaded");
        Ok(report)
    }

    /// [`unload`](Self::unload) for synchronous shutdown paths
    pub fn unload_blocking(&self) -> Result<DrainReport> {
        let module = self.clone();
        crate::blocking::block_on(self.inner.coordinator.handle(), async move {
            module.unload().await
        })?
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.inner.id)
            .field("root", &self.inner.root)
            .field("coordinator", &self.inner.coordinator)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Module`]
pub struct ModuleBuilder {
    id: ModuleId,
    root: PathBuf,
    config: Option<Arc<dyn ConfigSource>>,
    catalog: ServiceCatalog,
    unit_loader: Option<Arc<dyn UnitLoader>>,
    shared_paths: Vec<PathBuf>,
    assets_dir: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
    secrets: Vec<(String, String)>,
    vault: Option<Arc<dyn VaultClient>>,
    settings: LifecycleSettings,
    runtime: Option<Handle>,
}

impl ModuleBuilder {
    fn new(id: ModuleId, root: PathBuf) -> Self {
        Self {
            id,
            root,
            config: None,
            catalog: ServiceCatalog::new(),
            unit_loader: None,
            shared_paths: Vec::new(),
            assets_dir: None,
            search_paths: Vec::new(),
            secrets: Vec::new(),
            vault: None,
            settings: LifecycleSettings::default(),
            runtime: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: Arc<dyn ConfigSource>) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn catalog(mut self, catalog: ServiceCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn unit_loader(mut self, loader: Arc<dyn UnitLoader>) -> Self {
        self.unit_loader = Some(loader);
        self
    }

    /// Host-shared directories probed after a unit's own directory
    #[must_use]
    pub fn shared_dependency_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.shared_paths = paths;
        self
    }

    #[must_use]
    pub fn assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets_dir = Some(dir.into());
        self
    }

    /// Host module search paths, probed for assets without an assets dir
    #[must_use]
    pub fn search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    /// Add a named secret reference
    #[must_use]
    pub fn secret(mut self, name: impl Into<String>, reference: impl Into<String>) -> Self {
        self.secrets.push((name.into(), reference.into()));
        self
    }

    #[must_use]
    pub fn secrets(mut self, references: impl IntoIterator<Item = (String, String)>) -> Self {
        self.secrets.extend(references);
        self
    }

    #[must_use]
    pub fn vault(mut self, client: Arc<dyn VaultClient>) -> Self {
        self.vault = Some(client);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: LifecycleSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Runtime for module tasks; defaults to the calling task's runtime
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<Module> {
        self.settings.validate()?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| {
                Error::invalid_state(format!("module '{}' built outside a tokio runtime: {e}", self.id))
            })?,
        };

        let coordinator = UnloadCoordinator::new(
            self.id.clone(),
            runtime.clone(),
            self.settings.drain_warn_interval(),
        );
        let secrets = SecretStore::new(
            self.id.clone(),
            self.root.clone(),
            self.secrets,
            self.vault,
            coordinator.child_token(),
            runtime,
        );

        info!(
            module = %self.id,
            root = %self.root.display(),
            services = self.catalog.len(),
            "Module built"
        );

        Ok(Module {
            inner: Arc::new(ModuleInner {
                registry: ServiceRegistry::new(self.id.clone()),
                factory: ServiceFactory::new(self.catalog),
                loader: ModuleLoader::new(self.unit_loader, self.shared_paths),
                assets: AssetResolver::new(self.assets_dir, self.search_paths),
                config: self
                    .config
                    .unwrap_or_else(|| Arc::new(JsonConfigSource::empty())),
                settings: self.settings,
                coordinator,
                secrets,
                root: self.root,
                id: self.id,
            }),
        })
    }
}
