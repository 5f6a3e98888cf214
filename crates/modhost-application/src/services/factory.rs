//! Service factory
//!
//! Construction of a concrete blueprint follows a fixed sequence:
//!
//! 1. hold the module open for the construction (`AlreadyUnloaded` once the
//!    module has been signaled)
//! 2. look up the blueprint's configuration section in the module's source
//! 3. fail with `NotFound` if the section is required but missing
//! 4. run the validation hook (`ConfigurationInvalid` on rejection)
//! 5. invoke the first usable shape of `(Module, ConfigScope)`, `(Module)`, `()`
//!
//! Every constructed instance is then wired into the module lifecycle while
//! the module is still held open. An instance whose hooks can no longer be
//! scheduled is disposed once the module drains.

use std::sync::Arc;

use tracing::{Instrument, debug, info_span, warn};

use modhost_domain::{Error, Result};

use crate::lifecycle::TaskOutcome;
use crate::module::Module;

use super::catalog::ServiceCatalog;
use super::descriptor::{Constructed, ServiceBlueprint};

/// Creates services from a catalog of blueprints
#[derive(Debug, Clone, Default)]
pub struct ServiceFactory {
    catalog: ServiceCatalog,
}

impl ServiceFactory {
    pub fn new(catalog: ServiceCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// Construct a fresh instance of the single concrete type providing `C`
    ///
    /// The instance is wired into `module`'s lifecycle; its disposer runs
    /// when the module drains.
    pub fn create<C: ?Sized + Send + Sync + 'static>(&self, module: &Module) -> Result<Arc<C>> {
        let blueprint = self.catalog.find_concrete_for::<C>()?;
        let constructed = self.build(blueprint.as_ref(), module)?;
        constructed.project::<C>()
    }

    /// Construct and wire one blueprint
    pub(crate) fn build(&self, blueprint: &dyn ServiceBlueprint, module: &Module) -> Result<Constructed> {
        let _construction = module.coordinator().begin_construction(blueprint.type_name())?;
        let constructed = construct(blueprint, module)?;
        wire(module, &constructed, true)?;
        Ok(constructed)
    }
}

/// Run the construction sequence for `blueprint`
///
/// Callers hold a construction guard of `module` across this call and the
/// following [`wire`].
pub(crate) fn construct(blueprint: &dyn ServiceBlueprint, module: &Module) -> Result<Constructed> {
    let type_name = blueprint.type_name();
    let section = blueprint.config_section();
    let scope = module.config().scope(section);

    if let Some(scope) = &scope {
        blueprint
            .validate(scope.as_ref())
            .map_err(|message| Error::configuration_invalid(section, message))?;
    } else if blueprint.config_required() {
        return Err(Error::not_found(format!(
            "configuration section '{section}' required by {type_name}"
        )));
    }

    let shape = blueprint.shapes().select(scope.is_some()).ok_or_else(|| {
        let reason = if blueprint.shapes().with_config {
            format!("only a (Module, ConfigScope) constructor, and section '{section}' does not exist")
        } else {
            "no constructor declared".to_string()
        };
        Error::missing_constructor(type_name, reason)
    })?;

    debug!(module = %module.id(), service = type_name, ?shape, "Constructing service");
    blueprint
        .invoke(shape, module, scope)
        .map_err(|e| root_cause(&e, type_name))
}

/// Innermost runtime error in the chain, else a `Construction` error
pub(crate) fn root_cause(error: &anyhow::Error, type_name: &str) -> Error {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<Error>())
        .last()
        .cloned()
        .unwrap_or_else(|| Error::construction(type_name, error.root_cause().to_string()))
}

/// Schedule an instance's lifecycle hooks on its module
///
/// Configuration runs after a short jittered delay; background work after a
/// longer one and never before configuration completed. `register_dispose`
/// is off for instances whose owner disposes them itself. When a hook is
/// rejected because the module was signaled mid-construction, the instance
/// is handed to the module's disposers regardless of its owner.
pub(crate) fn wire(module: &Module, constructed: &Constructed, register_dispose: bool) -> Result<()> {
    let capabilities = &constructed.capabilities;
    if capabilities.is_empty() {
        return Ok(());
    }

    let scheduled = schedule_hooks(module, constructed);

    if let Some(disposable) = &capabilities.disposable {
        if register_dispose || scheduled.is_err() {
            let registered = Arc::clone(disposable);
            let coordinator = module.coordinator();
            if let Err(e) = coordinator.register_disposer(constructed.type_name, move || registered.dispose()) {
                warn!(
                    module = %module.id(),
                    service = constructed.type_name,
                    error = %e,
                    "Disposing instance the drained module can no longer track"
                );
                disposable.dispose();
                return scheduled.and(Err(e));
            }
        }
    }

    scheduled
}

fn schedule_hooks(module: &Module, constructed: &Constructed) -> Result<()> {
    let capabilities = &constructed.capabilities;
    let coordinator = module.coordinator();
    let settings = module.settings();
    let type_name = constructed.type_name;

    let configured = match &capabilities.configurable {
        Some(configurable) => {
            let configurable = Arc::clone(configurable);
            let owner = module.clone();
            let delay = settings.configure_delay();
            Some(coordinator.observe(format!("{type_name}::configure"), async move {
                tokio::time::sleep(delay).await;
                configurable.configure(&owner).await
            })?)
        }
        None => None,
    };

    if let Some(background) = &capabilities.background {
        let background = Arc::clone(background);
        let delay = settings.background_delay();
        let cancel = coordinator.child_token();
        let span = info_span!("background", module = %module.id(), service = type_name);
        coordinator.observe(
            format!("{type_name}::background"),
            async move {
                if let Some(configured) = configured {
                    let outcome = configured.wait().await;
                    if outcome != TaskOutcome::Succeeded {
                        anyhow::bail!("configuration ended with {outcome:?}; background work skipped");
                    }
                }
                tokio::select! {
                    () = cancel.cancelled() => return Ok(()),
                    () = tokio::time::sleep(delay) => {}
                }
                background.run(tracing::Span::current(), cancel).await
            }
            .instrument(span),
        )?;
    }

    Ok(())
}
