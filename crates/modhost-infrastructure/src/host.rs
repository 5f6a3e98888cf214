//! Module host
//!
//! Discovers module directories under the configured search paths, builds a
//! [`Module`] for each one and boots it. A module directory is any directory
//! holding a `module.toml` manifest:
//!
//! ```toml
//! entry = "billing"            # registered ModuleEntry
//! assets = "assets"            # optional, relative to the module directory
//!
//! [secrets]
//! api_key = "env://BILLING_API_KEY"
//!
//! [config.Ledger]              # overlays the host's [services.Ledger]
//! currency = "EUR"
//! ```
//!
//! Shutdown signals every module first, then drains them together, then
//! releases their units and singletons.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use figment::Figment;
use figment::providers::{Format, Toml};
use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use modhost_application::ports::registry::{ModuleEntry, find_module_entry};
use modhost_application::{Module, ServiceCatalog};
use modhost_domain::constants::SECRETS_SECTION;
use modhost_domain::ports::VaultClient;
use modhost_domain::{Error, ModuleId, Result};

use crate::config::{FigmentConfigSource, HostConfig};
use crate::constants::MODULE_MANIFEST_FILENAME;
use crate::error_ext::ErrorContext;
use crate::unit_loader::LinkedUnitLoader;
use crate::vault::HttpVaultClient;

/// Parsed `module.toml`
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleManifest {
    /// Name of the registered module entry
    pub entry: String,
    /// Module identity; defaults to the directory name
    #[serde(default)]
    pub id: Option<String>,
    /// Assets directory, relative to the module directory
    #[serde(default)]
    pub assets: Option<PathBuf>,
}

/// A module directory found during discovery
#[derive(Debug, Clone)]
pub struct DiscoveredModule {
    pub id: ModuleId,
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: ModuleManifest,
    /// Named secret references from the manifest's `[secrets]` table
    pub secrets: BTreeMap<String, String>,
}

impl DiscoveredModule {
    /// Parse the manifest of the module directory `root`
    pub fn read(root: &Path) -> Result<Self> {
        let manifest_path = root.join(MODULE_MANIFEST_FILENAME);
        let figment = Figment::from(Toml::file(&manifest_path));
        let manifest: ModuleManifest = figment
            .extract()
            .config_context(format!("invalid module manifest {}", manifest_path.display()))?;
        let secrets = if figment.contains(SECRETS_SECTION) {
            figment
                .extract_inner::<BTreeMap<String, String>>(SECRETS_SECTION)
                .config_context(format!(
                    "invalid [secrets] table in {}",
                    manifest_path.display()
                ))?
        } else {
            BTreeMap::new()
        };

        let id = manifest.id.clone().unwrap_or_else(|| {
            root.file_name()
                .map_or_else(|| manifest.entry.clone(), |name| name.to_string_lossy().into_owned())
        });

        Ok(Self {
            id: ModuleId::new(id),
            root: root.to_path_buf(),
            manifest_path,
            manifest,
            secrets,
        })
    }
}

/// Scan `search_paths` for module directories, in path then name order
///
/// Search paths that do not exist are skipped.
pub fn discover_modules(search_paths: &[PathBuf]) -> Result<Vec<DiscoveredModule>> {
    let mut discovered = Vec::new();
    for search_path in search_paths {
        if !search_path.is_dir() {
            debug!(path = %search_path.display(), "Module search path missing, skipped");
            continue;
        }

        let mut roots = std::fs::read_dir(search_path)
            .io_context(format!("failed to scan {}", search_path.display()))?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.join(MODULE_MANIFEST_FILENAME).is_file())
            .collect::<Vec<_>>();
        roots.sort();

        for root in roots {
            discovered.push(DiscoveredModule::read(&root)?);
        }
    }
    Ok(discovered)
}

/// Owns every module booted from the host configuration
pub struct ModuleHost {
    config: HostConfig,
    vault: Option<Arc<dyn VaultClient>>,
    modules: Vec<Module>,
}

impl ModuleHost {
    /// Host for `config`; connects the vault client when one is configured
    pub fn new(config: HostConfig) -> Result<Self> {
        let vault = match &config.secrets.vault {
            Some(vault) => Some(Arc::new(HttpVaultClient::from_config(vault)?) as Arc<dyn VaultClient>),
            None => None,
        };
        Ok(Self {
            config,
            vault,
            modules: Vec::new(),
        })
    }

    /// Replace the vault client
    #[must_use]
    pub fn with_vault(mut self, client: Arc<dyn VaultClient>) -> Self {
        self.vault = Some(client);
        self
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Modules booted so far, in boot order
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, id: &str) -> Option<&Module> {
        self.modules.iter().find(|module| module.id().as_str() == id)
    }

    /// Build a module from its directory and the entry it names
    pub fn build_module(&self, discovered: &DiscoveredModule, entry: &ModuleEntry) -> Result<Module> {
        let mut catalog = ServiceCatalog::new();
        (entry.register)(&mut catalog);

        let mut builder = Module::builder(discovered.id.clone(), discovered.root.clone())
            .catalog(catalog)
            .config(Arc::new(FigmentConfigSource::for_module(
                &self.config.services,
                &discovered.manifest_path,
            )))
            .unit_loader(Arc::new(LinkedUnitLoader::new()))
            .shared_dependency_paths(self.config.modules.shared_dependency_paths.clone())
            .search_paths(self.config.modules.search_paths.clone())
            .secrets(discovered.secrets.clone())
            .settings(self.config.lifecycle.clone());

        if let Some(assets) = &discovered.manifest.assets {
            builder = builder.assets_dir(discovered.root.join(assets));
        }
        if let Some(vault) = &self.vault {
            builder = builder.vault(Arc::clone(vault));
        }
        builder.build()
    }

    /// Discover, build and boot every module
    ///
    /// Stops at the first module that cannot be built or booted; a module
    /// whose boot fails is unloaded before the error is returned. Modules
    /// booted earlier stay up until [`shutdown`](Self::shutdown).
    pub async fn boot(&mut self) -> Result<usize> {
        let discovered = discover_modules(&self.config.modules.search_paths)?;
        for candidate in &discovered {
            let entry = find_module_entry(&candidate.manifest.entry).ok_or_else(|| {
                Error::not_found(format!(
                    "module entry '{}' (module '{}')",
                    candidate.manifest.entry, candidate.id
                ))
            })?;
            if self.module(candidate.id.as_str()).is_some() {
                warn!(module = %candidate.id, root = %candidate.root.display(), "Duplicate module id, skipped");
                continue;
            }

            let module = self.build_module(candidate, entry)?;
            if let Err(e) = (entry.boot)(module.clone()).await {
                error!(module = %candidate.id, error = %format!("{e:#}"), "Module failed to boot");
                if let Err(unload) = module.unload().await {
                    warn!(module = %candidate.id, error = %unload, "Unload after failed boot");
                }
                return Err(Error::internal(format!(
                    "module '{}' failed to boot: {e:#}",
                    candidate.id
                )));
            }

            info!(module = %candidate.id, entry = entry.name, "Module booted");
            self.modules.push(module);
        }
        Ok(self.modules.len())
    }

    /// Unload every module: signal all, drain all, then release
    ///
    /// Every module is released even when another one fails to drain; the
    /// first failure is returned.
    pub async fn shutdown(&mut self) -> Result<usize> {
        let modules = std::mem::take(&mut self.modules);
        for module in &modules {
            module.signal_unload();
        }

        let drained = join_all(modules.iter().map(|module| module.drain())).await;

        let mut first_error = None;
        let mut disposed = 0;
        for (module, drained) in modules.iter().zip(drained) {
            match drained {
                Ok(report) => disposed += report.disposed,
                Err(e) => {
                    error!(module = %module.id(), error = %e, "Module failed to drain");
                    first_error.get_or_insert(e);
                }
            }
            // Already drained: this only releases units and singletons
            if let Err(e) = module.unload().await {
                first_error.get_or_insert(e);
            }
        }

        info!(modules = modules.len(), disposed, "Host shut down");
        first_error.map_or(Ok(disposed), Err)
    }

    /// Boot, wait for Ctrl+C, then shut down
    pub async fn run_until_ctrl_c(&mut self) -> Result<()> {
        let booted = match self.boot().await {
            Ok(booted) => booted,
            Err(e) => {
                self.shutdown().await?;
                return Err(e);
            }
        };
        info!(modules = booted, "Host running, press Ctrl+C to stop");

        tokio::signal::ctrl_c()
            .await
            .io_context("failed to listen for Ctrl+C")?;
        info!("Shutdown requested");
        self.shutdown().await.map(|_| ())
    }
}
