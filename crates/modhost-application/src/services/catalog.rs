//! Service catalogs
//!
//! A catalog is an ordered collection of blueprints: the types a module can
//! construct, or the types a unit exports.

use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use modhost_domain::{Error, Result};

use crate::ports::capabilities::Capabilities;

use super::descriptor::{ServiceBlueprint, ServiceDescriptor};

/// Ordered collection of service blueprints
#[derive(Clone, Default)]
pub struct ServiceCatalog {
    blueprints: Vec<Arc<dyn ServiceBlueprint>>,
}

impl ServiceCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor
    pub fn register<T: Capabilities>(&mut self, descriptor: ServiceDescriptor<T>) -> &mut Self {
        self.blueprints.push(Arc::new(descriptor));
        self
    }

    /// Register a descriptor, builder style
    #[must_use]
    pub fn with<T: Capabilities>(mut self, descriptor: ServiceDescriptor<T>) -> Self {
        self.register(descriptor);
        self
    }

    /// Append every blueprint of another catalog
    pub fn extend(&mut self, other: &ServiceCatalog) {
        self.blueprints.extend(other.blueprints.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }

    /// Iterate over the blueprints in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ServiceBlueprint>> {
        self.blueprints.iter()
    }

    /// Blueprint registered for a concrete type
    pub fn by_concrete_type(&self, concrete: TypeId) -> Option<Arc<dyn ServiceBlueprint>> {
        self.blueprints
            .iter()
            .find(|blueprint| blueprint.concrete_type() == concrete)
            .cloned()
    }

    /// The single concrete blueprint providing `capability`
    ///
    /// Abstract blueprints are skipped. Zero candidates is `NotFound`; more
    /// than one is `Ambiguous` unless exactly one is marked preferred.
    pub fn find_concrete(
        &self,
        capability: TypeId,
        capability_name: &str,
    ) -> Result<Arc<dyn ServiceBlueprint>> {
        let candidates: Vec<_> = self
            .blueprints
            .iter()
            .filter(|blueprint| !blueprint.is_abstract() && blueprint.views().provides(capability))
            .collect();

        match candidates.as_slice() {
            [] => Err(Error::not_found(format!(
                "concrete type providing {capability_name}"
            ))),
            [only] => Ok(Arc::clone(only)),
            many => {
                let preferred: Vec<_> = many.iter().filter(|b| b.is_preferred()).collect();
                if let [winner] = preferred.as_slice() {
                    return Ok(Arc::clone(winner));
                }
                Err(Error::ambiguous(
                    capability_name,
                    many.iter().map(|b| b.type_name().to_string()).collect(),
                ))
            }
        }
    }

    /// Typed form of [`find_concrete`](Self::find_concrete)
    pub fn find_concrete_for<C: ?Sized + 'static>(&self) -> Result<Arc<dyn ServiceBlueprint>> {
        self.find_concrete(TypeId::of::<C>(), type_name::<C>())
    }
}

impl fmt::Debug for ServiceCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.blueprints.iter().map(|b| b.type_name()))
            .finish()
    }
}
