//! Secret store
//!
//! Maps a module's secret names to raw references. A reference is parsed
//! once, on first fetch, and dispatched on its scheme:
//!
//! | Reference | Source |
//! |-----------|--------|
//! | `env://NAME` | environment variable |
//! | `file://PATH` | file contents (relative paths resolve against the module root) |
//! | `vault://mount/path?secret=key` | [`VaultClient`] |
//! | anything else | the reference itself |

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use zeroize::Zeroizing;

use modhost_domain::ports::VaultClient;
use modhost_domain::ports::secrets::VaultError;
use modhost_domain::value_objects::InvalidSecretReference;
use modhost_domain::{Error, ModuleId, Result, SecretReference, SecretScheme};

use super::value::SecretValue;

/// One named secret reference
pub struct SecretHandle {
    name: String,
    raw: Zeroizing<String>,
    reference: OnceLock<std::result::Result<SecretReference, InvalidSecretReference>>,
}

impl SecretHandle {
    fn new(name: String, raw: String) -> Self {
        Self {
            name,
            raw: Zeroizing::new(raw),
            reference: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parsed reference; parsing happens at most once
    pub fn reference(&self) -> Result<&SecretReference> {
        self.reference
            .get_or_init(|| SecretReference::parse(&self.raw))
            .as_ref()
            .map_err(|e| Error::backing_store(&self.name, e.scheme, e.reason.clone()))
    }

    /// Whether the reference has been parsed yet
    pub fn is_parsed(&self) -> bool {
        self.reference.get().is_some()
    }
}

impl std::fmt::Debug for SecretHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretHandle")
            .field("name", &self.name)
            .field("reference", &self.reference.get())
            .finish_non_exhaustive()
    }
}

/// A module's secrets
pub struct SecretStore {
    module: ModuleId,
    root: PathBuf,
    handles: DashMap<String, Arc<SecretHandle>>,
    vault: Option<Arc<dyn VaultClient>>,
    unload: CancellationToken,
    runtime: Handle,
}

impl SecretStore {
    /// Store over `references` (name, raw reference) pairs
    ///
    /// Fetches are rejected once `unload` is cancelled.
    pub fn new(
        module: ModuleId,
        root: PathBuf,
        references: impl IntoIterator<Item = (String, String)>,
        vault: Option<Arc<dyn VaultClient>>,
        unload: CancellationToken,
        runtime: Handle,
    ) -> Self {
        let handles = references
            .into_iter()
            .map(|(name, raw)| (name.clone(), Arc::new(SecretHandle::new(name, raw))))
            .collect();
        Self {
            module,
            root,
            handles,
            vault,
            unload,
            runtime,
        }
    }

    /// Add or replace a reference
    pub fn insert(&self, name: impl Into<String>, raw: impl Into<String>) {
        let name = name.into();
        self.handles
            .insert(name.clone(), Arc::new(SecretHandle::new(name, raw.into())));
    }

    pub fn handle(&self, name: &str) -> Option<Arc<SecretHandle>> {
        self.handles.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }

    /// Names of every configured secret
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        names.sort_unstable();
        names
    }

    /// Fetch a secret; `Ok(None)` when the name is not configured
    ///
    /// Vault references are read through the module runtime, blocking only
    /// the calling thread.
    pub fn fetch_secret(&self, name: &str) -> Result<Option<SecretValue>> {
        let Some(handle) = self.live_handle(name)? else {
            return Ok(None);
        };

        let value = match handle.reference()? {
            SecretReference::Literal(literal) => SecretValue::new(literal.as_bytes().to_vec()),
            SecretReference::Env { variable } => read_env(name, variable)?,
            SecretReference::File { path } => {
                let path = self.resolve_path(path);
                let bytes = std::fs::read(&path)
                    .map_err(|e| Error::backing_store_with_source(name, SecretScheme::File, e))?;
                SecretValue::new(bytes)
            }
            SecretReference::Vault { mount, path, key } => {
                let vault = self.vault_client(name)?;
                let (mount, path, key) = (mount.clone(), path.clone(), key.clone());
                let read = crate::blocking::block_on(&self.runtime, async move {
                    vault.read(&mount, &path, &key).await
                })?;
                vault_value(name, read)?
            }
        };

        self.log_fetch(&handle);
        Ok(Some(value))
    }

    /// Asynchronous [`fetch_secret`](Self::fetch_secret)
    pub async fn fetch_secret_async(&self, name: &str) -> Result<Option<SecretValue>> {
        let Some(handle) = self.live_handle(name)? else {
            return Ok(None);
        };

        let value = match handle.reference()? {
            SecretReference::Literal(literal) => SecretValue::new(literal.as_bytes().to_vec()),
            SecretReference::Env { variable } => read_env(name, variable)?,
            SecretReference::File { path } => {
                let path = self.resolve_path(path);
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| Error::backing_store_with_source(name, SecretScheme::File, e))?;
                SecretValue::new(bytes)
            }
            SecretReference::Vault { mount, path, key } => {
                let vault = self.vault_client(name)?;
                let read = vault.read(mount, path, key).await;
                vault_value(name, read)?
            }
        };

        self.log_fetch(&handle);
        Ok(Some(value))
    }

    /// Fetch a secret and lend its plaintext to `action`
    ///
    /// The plaintext is zeroed as soon as `action` returns or unwinds.
    pub fn with_secret<F, R>(&self, name: &str, action: F) -> Result<Option<R>>
    where
        F: FnOnce(&[u8]) -> R,
    {
        Ok(self
            .fetch_secret(name)?
            .map(|value| value.use_secret(action)))
    }

    fn live_handle(&self, name: &str) -> Result<Option<Arc<SecretHandle>>> {
        if self.unload.is_cancelled() {
            return Err(Error::already_unloaded(
                self.module.as_str(),
                format!("fetch_secret({name})"),
            ));
        }
        Ok(self.handle(name))
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn vault_client(&self, name: &str) -> Result<Arc<dyn VaultClient>> {
        self.vault.clone().ok_or_else(|| {
            Error::backing_store(name, SecretScheme::Vault, "no vault client configured")
        })
    }

    fn log_fetch(&self, handle: &SecretHandle) {
        if let Ok(reference) = handle.reference() {
            debug!(
                module = %self.module,
                secret = handle.name(),
                scheme = %reference.scheme(),
                "Secret fetched"
            );
        }
    }
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore")
            .field("module", &self.module)
            .field("names", &self.names())
            .field("vault", &self.vault.as_ref().map(|v| v.client_name().to_string()))
            .finish_non_exhaustive()
    }
}

fn read_env(name: &str, variable: &str) -> Result<SecretValue> {
    std::env::var_os(variable)
        .map(|value| SecretValue::new(value.into_encoded_bytes()))
        .ok_or_else(|| {
            Error::backing_store(
                name,
                SecretScheme::Env,
                format!("environment variable '{variable}' is not set"),
            )
        })
}

fn vault_value(
    name: &str,
    read: std::result::Result<Zeroizing<Vec<u8>>, VaultError>,
) -> Result<SecretValue> {
    match read {
        Ok(mut bytes) => Ok(SecretValue::new(std::mem::take(&mut *bytes))),
        Err(e) => Err(Error::BackingStoreFailure {
            name: name.to_string(),
            scheme: SecretScheme::Vault,
            message: e.to_string(),
            source: Some(Arc::from(e)),
        }),
    }
}
