//! # modhost Application Layer
//!
//! The module lifecycle runtime: everything between "a module directory was
//! found" and "its code may be released".
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`ports`] | Capability contracts, unit loader port, link-time registries |
//! | [`services`] | Service descriptors, factory and per-module singleton registry |
//! | [`lifecycle`] | Unload coordination and startup jitter settings |
//! | [`loader`] | Unit loading, dependency and asset resolution |
//! | [`secrets`] | Lazily parsed secret references with zeroizing values |
//! | [`module`] | The [`Module`] handle tying the above together |
//! | [`config`] | In-memory configuration source |

pub mod config;
pub mod lifecycle;
pub mod loader;
pub mod module;
pub mod ports;
pub mod secrets;
pub mod services;

mod blocking;

pub use config::JsonConfigSource;
pub use lifecycle::{DrainReport, LifecycleSettings, TaskCompletion, TaskOutcome, UnloadCoordinator};
pub use loader::{AssetResolver, DependencyResolver, LoadedUnit, ModuleLoader};
pub use module::{Module, ModuleBuilder};
pub use ports::{AsyncConfigurable, BackgroundWork, Capabilities, Disposable};
pub use secrets::{SecretStore, SecretValue};
pub use services::{ServiceCatalog, ServiceDescriptor, ServiceFactory, ServiceRegistry};

// Re-exports used by unit and module registrations.
pub use linkme;
pub use modhost_domain as domain;
