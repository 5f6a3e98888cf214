//! # modhost
//!
//! A runtime for independently loadable modules. Each module gets lazily
//! constructed singleton services, lifecycle hooks with startup jitter, a
//! coordinated unload that drains every tracked task before code is
//! released, and named secrets resolved from env, file or vault references.
//!
//! ## Example
//!
//! ```ignore
//! use modhost::application::{Module, ServiceCatalog, ServiceDescriptor};
//!
//! let catalog = ServiceCatalog::new().with(
//!     ServiceDescriptor::<Ledger>::new()
//!         .with_config(|module, scope| Ledger::new(module, &*scope))
//!         .provides::<dyn Accounts>(|s| s),
//! );
//! let module = Module::builder("billing", "/srv/modules/billing")
//!     .catalog(catalog)
//!     .build()?;
//!
//! let accounts = module.service::<dyn Accounts>().await?;
//! module.unload().await?;
//! ```
//!
//! ## Architecture
//!
//! - `domain` - error taxonomy, module identity, secret references, ports
//! - `application` - loader, service factory and registry, unload coordinator, secrets
//! - `infrastructure` - figment configuration, logging, linked units, vault, module host
//! - `builtin` - modules shipped with the `modhost` binary

use std::path::Path;

/// Domain layer - error taxonomy, value objects and ports
pub mod domain {
    pub use modhost_domain::*;
}

/// Application layer - the module lifecycle runtime
pub mod application {
    pub use modhost_application::*;
}

/// Infrastructure layer - configuration, logging and the module host
pub mod infrastructure {
    pub use modhost_infrastructure::*;
}

pub mod builtin;

pub use domain::{Error, ErrorKind, ModuleId, Result};
pub use modhost_application::{Module, ModuleBuilder, ServiceCatalog, ServiceDescriptor};
pub use modhost_infrastructure::{ConfigLoader, HostConfig, ModuleHost};

use modhost_application::ports::registry::{list_linked_units, list_module_entries};
use modhost_infrastructure::logging::init_logging;

/// Load configuration, boot every discovered module and serve until Ctrl+C
pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = config_path {
        loader = loader.with_config_path(path);
    }
    let config = loader.load()?;
    init_logging(&config.logging)?;

    let mut host = ModuleHost::new(config)?;
    host.run_until_ctrl_c().await?;
    Ok(())
}

/// Registered linked units and module entries, as (name, description) pairs
pub fn registrations() -> (Vec<(&'static str, &'static str)>, Vec<(&'static str, &'static str)>) {
    (list_linked_units(), list_module_entries())
}
