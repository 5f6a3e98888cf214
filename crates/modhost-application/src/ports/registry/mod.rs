//! Link-time registries
//!
//! Units and module entries register themselves with `linkme` distributed
//! slices, so the host discovers them without a central list.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Registration Flow                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  1. Unit crate:     #[distributed_slice(LINKED_UNITS)]          │
//! │                     static UNIT: LinkedUnitEntry = ...          │
//! │                              ↓                                  │
//! │  2. Unit manifest:  unit = "metrics-sink"                       │
//! │                              ↓                                  │
//! │  3. Loader binds:   find_linked_unit("metrics-sink")            │
//! │                              ↓                                  │
//! │  4. Module asks:    module.resolve_unit::<dyn Sink>(path)       │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Registering a unit
//!
//! ```ignore
//! use modhost_application::linkme::distributed_slice;
//! use modhost_application::ports::registry::{LinkedUnitEntry, LINKED_UNITS};
//!
//! #[distributed_slice(LINKED_UNITS)]
//! static METRICS_SINK: LinkedUnitEntry = LinkedUnitEntry {
//!     name: "metrics-sink",
//!     description: "Pushes module metrics to a collector",
//!     exports: || ServiceCatalog::new().with(ServiceDescriptor::<Sink>::new()...),
//! };
//! ```

pub mod modules;
pub mod units;

pub use modules::{MODULE_ENTRIES, ModuleEntry, find_module_entry, list_module_entries};
pub use units::{LINKED_UNITS, LinkedUnitEntry, find_linked_unit, list_linked_units};
