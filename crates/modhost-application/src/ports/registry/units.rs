//! Linked unit registry

use crate::services::ServiceCatalog;

/// Registry entry for a unit linked into the host binary
pub struct LinkedUnitEntry {
    /// Name unit manifests refer to
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Builds the catalog of exported service blueprints
    pub exports: fn() -> ServiceCatalog,
}

#[linkme::distributed_slice]
pub static LINKED_UNITS: [LinkedUnitEntry] = [..];

/// Find a linked unit by name
pub fn find_linked_unit(name: &str) -> Option<&'static LinkedUnitEntry> {
    LINKED_UNITS.iter().find(|entry| entry.name == name)
}

/// List all linked units as (name, description) pairs
pub fn list_linked_units() -> Vec<(&'static str, &'static str)> {
    let mut units: Vec<_> = LINKED_UNITS
        .iter()
        .map(|entry| (entry.name, entry.description))
        .collect();
    units.sort_unstable();
    units
}
