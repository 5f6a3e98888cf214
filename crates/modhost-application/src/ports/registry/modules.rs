//! Module entry registry
//!
//! A module entry is the code behind a module directory: it contributes the
//! service blueprints the module can construct and the boot routine the host
//! runs once the module is built.

use futures::future::BoxFuture;

use crate::module::Module;
use crate::services::ServiceCatalog;

/// Registry entry for a module implementation
pub struct ModuleEntry {
    /// Name module manifests refer to
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Adds the module's service blueprints to its catalog
    pub register: fn(&mut ServiceCatalog),
    /// Starts the module; runs after the module has been built
    pub boot: fn(Module) -> BoxFuture<'static, anyhow::Result<()>>,
}

#[linkme::distributed_slice]
pub static MODULE_ENTRIES: [ModuleEntry] = [..];

/// Find a module entry by name
pub fn find_module_entry(name: &str) -> Option<&'static ModuleEntry> {
    MODULE_ENTRIES.iter().find(|entry| entry.name == name)
}

/// List all module entries as (name, description) pairs
pub fn list_module_entries() -> Vec<(&'static str, &'static str)> {
    let mut entries: Vec<_> = MODULE_ENTRIES
        .iter()
        .map(|entry| (entry.name, entry.description))
        .collect();
    entries.sort_unstable();
    entries
}
