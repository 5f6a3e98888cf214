//! Service descriptors
//!
//! A [`ServiceDescriptor`] is the explicit registration of one concrete
//! service type: how it can be constructed, which configuration section it
//! reads, and which capabilities it may be handed out as. Descriptors are
//! type-erased into [`ServiceBlueprint`]s so catalogs can hold many types.

use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use modhost_domain::ports::ConfigScope;

use crate::module::Module;
use crate::ports::capabilities::{Capabilities, CapabilitySet};

use super::views::{ErasedService, ViewTable};

type WithConfig<T> = Box<dyn Fn(&Module, Arc<dyn ConfigScope>) -> anyhow::Result<T> + Send + Sync>;
type WithModule<T> = Box<dyn Fn(&Module) -> anyhow::Result<T> + Send + Sync>;
type WithDefault<T> = Box<dyn Fn() -> anyhow::Result<T> + Send + Sync>;
type Validator = Box<dyn Fn(&dyn ConfigScope) -> Result<(), String> + Send + Sync>;

/// Constructor signatures a service type may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorShape {
    /// `(Module, ConfigScope)`
    WithConfig,
    /// `(Module)`
    WithModule,
    /// `()`
    Default,
}

/// The shapes one type declares
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstructorShapes {
    pub with_config: bool,
    pub with_module: bool,
    pub default: bool,
}

impl ConstructorShapes {
    /// Pick the first usable shape; `(Module, ConfigScope)` needs a scope
    pub fn select(self, has_scope: bool) -> Option<ConstructorShape> {
        if has_scope && self.with_config {
            Some(ConstructorShape::WithConfig)
        } else if self.with_module {
            Some(ConstructorShape::WithModule)
        } else if self.default {
            Some(ConstructorShape::Default)
        } else {
            None
        }
    }
}

/// A freshly constructed, not yet wired, service instance
#[derive(Clone)]
pub struct Constructed {
    pub type_name: &'static str,
    pub instance: ErasedService,
    pub views: ViewTable,
    pub capabilities: CapabilitySet,
}

impl Constructed {
    /// Wrap a typed instance
    pub fn new<T: Capabilities>(type_name: &'static str, instance: Arc<T>, views: ViewTable) -> Self {
        let capabilities = CapabilitySet::of(&instance);
        Self {
            type_name,
            instance,
            views,
            capabilities,
        }
    }

    /// View the instance as capability `C`
    pub fn project<C: ?Sized + Send + Sync + 'static>(&self) -> modhost_domain::Result<Arc<C>> {
        self.views.project::<C>(&self.instance).ok_or_else(|| {
            modhost_domain::Error::internal(format!(
                "{} does not provide {}",
                self.type_name,
                type_name::<C>()
            ))
        })
    }
}

impl fmt::Debug for Constructed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructed")
            .field("type_name", &self.type_name)
            .field("views", &self.views)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Type-erased [`ServiceDescriptor`]
pub trait ServiceBlueprint: Send + Sync {
    /// Full name of the concrete type
    fn type_name(&self) -> &'static str;

    /// `TypeId` of the concrete type
    fn concrete_type(&self) -> TypeId;

    /// Abstract exports are never selected for construction
    fn is_abstract(&self) -> bool;

    /// Preferred exports win an otherwise ambiguous selection
    fn is_preferred(&self) -> bool;

    /// Capabilities the type provides
    fn views(&self) -> &ViewTable;

    /// Configuration section handed to the `(Module, ConfigScope)` shape
    fn config_section(&self) -> &str;

    /// Whether construction fails when the section is missing
    fn config_required(&self) -> bool;

    /// Declared constructor shapes
    fn shapes(&self) -> ConstructorShapes;

    /// Run the validation hook against the section
    fn validate(&self, scope: &dyn ConfigScope) -> Result<(), String>;

    /// Invoke one constructor shape
    fn invoke(
        &self,
        shape: ConstructorShape,
        module: &Module,
        scope: Option<Arc<dyn ConfigScope>>,
    ) -> anyhow::Result<Constructed>;
}

/// Registration of a concrete service type
///
/// ```ignore
/// let descriptor = ServiceDescriptor::<HttpFetcher>::new()
///     .config_section("fetcher")
///     .with_config(|module, scope| HttpFetcher::from_config(module, &*scope))
///     .with_default(|| Ok(HttpFetcher::default()))
///     .provides::<dyn Fetcher>(|s| s);
/// ```
pub struct ServiceDescriptor<T> {
    type_name: &'static str,
    config_section: String,
    config_required: bool,
    is_abstract: bool,
    preferred: bool,
    with_config: Option<WithConfig<T>>,
    with_module: Option<WithModule<T>>,
    with_default: Option<WithDefault<T>>,
    validator: Option<Validator>,
    views: ViewTable,
}

impl<T: Capabilities> ServiceDescriptor<T> {
    /// Descriptor with no constructors, reading the section named after the
    /// type's short name
    pub fn new() -> Self {
        let type_name = type_name::<T>();
        Self {
            type_name,
            config_section: short_type_name(type_name).to_string(),
            config_required: false,
            is_abstract: false,
            preferred: false,
            with_config: None,
            with_module: None,
            with_default: None,
            validator: None,
            views: ViewTable::for_concrete::<T>(),
        }
    }

    /// Declare the `(Module, ConfigScope)` constructor
    #[must_use]
    pub fn with_config<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&Module, Arc<dyn ConfigScope>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.with_config = Some(Box::new(constructor));
        self
    }

    /// Declare the `(Module)` constructor
    #[must_use]
    pub fn with_module<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&Module) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.with_module = Some(Box::new(constructor));
        self
    }

    /// Declare the `()` constructor
    #[must_use]
    pub fn with_default<F>(mut self, constructor: F) -> Self
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.with_default = Some(Box::new(constructor));
        self
    }

    /// Override the configuration section name
    #[must_use]
    pub fn config_section(mut self, section: impl Into<String>) -> Self {
        self.config_section = section.into();
        self
    }

    /// Fail construction when the configuration section is missing
    #[must_use]
    pub fn require_config(mut self) -> Self {
        self.config_required = true;
        self
    }

    /// Validate the configuration section before construction
    #[must_use]
    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&dyn ConfigScope) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Expose the type as capability `C`
    #[must_use]
    pub fn provides<C>(mut self, project: fn(Arc<T>) -> Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.views.insert::<T, C>(project);
        self
    }

    /// Win ambiguous selections against other exports of a capability
    #[must_use]
    pub fn preferred(mut self) -> Self {
        self.preferred = true;
        self
    }

    /// Never select this type for construction
    #[must_use]
    pub fn mark_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    fn finish(&self, instance: T) -> Constructed {
        Constructed::new(self.type_name, Arc::new(instance), self.views.clone())
    }
}

impl<T: Capabilities> Default for ServiceDescriptor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Capabilities> ServiceBlueprint for ServiceDescriptor<T> {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn concrete_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    fn is_preferred(&self) -> bool {
        self.preferred
    }

    fn views(&self) -> &ViewTable {
        &self.views
    }

    fn config_section(&self) -> &str {
        &self.config_section
    }

    fn config_required(&self) -> bool {
        self.config_required
    }

    fn shapes(&self) -> ConstructorShapes {
        ConstructorShapes {
            with_config: self.with_config.is_some(),
            with_module: self.with_module.is_some(),
            default: self.with_default.is_some(),
        }
    }

    fn validate(&self, scope: &dyn ConfigScope) -> Result<(), String> {
        match &self.validator {
            Some(validator) => validator(scope),
            None => Ok(()),
        }
    }

    fn invoke(
        &self,
        shape: ConstructorShape,
        module: &Module,
        scope: Option<Arc<dyn ConfigScope>>,
    ) -> anyhow::Result<Constructed> {
        let instance = match (shape, &self.with_config, &self.with_module, &self.with_default) {
            (ConstructorShape::WithConfig, Some(constructor), _, _) => {
                let scope = scope.ok_or_else(|| {
                    anyhow::anyhow!("{} selected without a configuration scope", self.type_name)
                })?;
                constructor(module, scope)?
            }
            (ConstructorShape::WithModule, _, Some(constructor), _) => constructor(module)?,
            (ConstructorShape::Default, _, _, Some(constructor)) => constructor()?,
            _ => anyhow::bail!("{} does not declare the {shape:?} constructor", self.type_name),
        };
        Ok(self.finish(instance))
    }
}

/// Last path segment of a type name, without generic arguments
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
