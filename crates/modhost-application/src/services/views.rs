//! Capability views
//!
//! A constructed service is stored type-erased. Its [`ViewTable`] records
//! every capability type the service may be handed out as, together with the
//! projection from the erased instance to an `Arc` of that capability.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A type-erased service instance
pub type ErasedService = Arc<dyn Any + Send + Sync>;

type Projection = Arc<dyn Fn(ErasedService) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

#[derive(Clone)]
struct View {
    name: &'static str,
    project: Projection,
}

/// Projections from an erased service to the capabilities it provides
#[derive(Clone, Default)]
pub struct ViewTable {
    views: HashMap<TypeId, View>,
}

impl ViewTable {
    /// Table exposing only the concrete type itself
    pub fn for_concrete<T: Send + Sync + 'static>() -> Self {
        let mut table = Self::default();
        table.insert::<T, T>(|service| service);
        table
    }

    /// Expose `T` as capability `C`
    pub fn insert<T, C>(&mut self, project: fn(Arc<T>) -> Arc<C>)
    where
        T: Send + Sync + 'static,
        C: ?Sized + Send + Sync + 'static,
    {
        let projection: Projection = Arc::new(move |erased: ErasedService| {
            let concrete = erased.downcast::<T>().ok()?;
            Some(Box::new(project(concrete)) as Box<dyn Any + Send + Sync>)
        });
        self.views.insert(
            TypeId::of::<C>(),
            View {
                name: type_name::<C>(),
                project: projection,
            },
        );
    }

    /// Whether the table can project to `capability`
    pub fn provides(&self, capability: TypeId) -> bool {
        self.views.contains_key(&capability)
    }

    /// Project an erased instance to capability `C`
    pub fn project<C: ?Sized + Send + Sync + 'static>(
        &self,
        service: &ErasedService,
    ) -> Option<Arc<C>> {
        let view = self.views.get(&TypeId::of::<C>())?;
        let projected = (view.project)(Arc::clone(service))?;
        projected.downcast::<Arc<C>>().ok().map(|boxed| *boxed)
    }

    /// Names of every capability in the table
    pub fn capability_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.views.values().map(|view| view.name).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ViewTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.capability_names()).finish()
    }
}
