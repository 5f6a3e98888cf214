//! Services
//!
//! - [`descriptor`]: explicit registration of a concrete service type
//! - [`catalog`]: collections of blueprints and the one-concrete-type rule
//! - [`views`]: projections from erased instances to capabilities
//! - [`factory`]: construction and lifecycle wiring
//! - [`registry`]: per-module singletons

pub mod catalog;
pub mod descriptor;
pub mod factory;
pub mod registry;
pub mod views;

pub use catalog::ServiceCatalog;
pub use descriptor::{Constructed, ConstructorShape, ServiceBlueprint, ServiceDescriptor};
pub use factory::ServiceFactory;
pub use registry::ServiceRegistry;
pub use views::{ErasedService, ViewTable};
