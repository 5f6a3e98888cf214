//! Lifecycle capabilities
//!
//! Rust has no runtime interface queries, so a service type opts into each
//! lifecycle hook through [`Capabilities`]. The default methods report "not
//! supported"; a service overrides the ones it implements:
//!
//! ```ignore
//! impl Capabilities for Poller {
//!     fn as_background_work(self: Arc<Self>) -> Option<Arc<dyn BackgroundWork>> {
//!         Some(self)
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::module::Module;

/// Asynchronous post-construction configuration
#[async_trait]
pub trait AsyncConfigurable: Send + Sync {
    /// Finish configuring the service
    async fn configure(&self, module: &Module) -> anyhow::Result<()>;
}

/// Long-running work owned by a service
#[async_trait]
pub trait BackgroundWork: Send + Sync {
    /// Run until done or until `cancel` fires
    ///
    /// `span` carries the module and service identity for log correlation.
    async fn run(&self, span: tracing::Span, cancel: CancellationToken) -> anyhow::Result<()>;
}

/// Synchronous teardown run after the module has drained
pub trait Disposable: Send + Sync {
    /// Release resources held by the service
    fn dispose(&self);
}

/// Capability queries for a constructed service
pub trait Capabilities: Send + Sync + 'static {
    fn as_configurable(self: Arc<Self>) -> Option<Arc<dyn AsyncConfigurable>> {
        None
    }

    fn as_background_work(self: Arc<Self>) -> Option<Arc<dyn BackgroundWork>> {
        None
    }

    fn as_disposable(self: Arc<Self>) -> Option<Arc<dyn Disposable>> {
        None
    }
}

/// The capabilities one instance exposes, queried once after construction
#[derive(Clone, Default)]
pub struct CapabilitySet {
    pub configurable: Option<Arc<dyn AsyncConfigurable>>,
    pub background: Option<Arc<dyn BackgroundWork>>,
    pub disposable: Option<Arc<dyn Disposable>>,
}

impl CapabilitySet {
    /// Query every capability of `instance`
    pub fn of<T: Capabilities>(instance: &Arc<T>) -> Self {
        Self {
            configurable: Arc::clone(instance).as_configurable(),
            background: Arc::clone(instance).as_background_work(),
            disposable: Arc::clone(instance).as_disposable(),
        }
    }

    /// Whether the instance needs no lifecycle wiring at all
    pub fn is_empty(&self) -> bool {
        self.configurable.is_none() && self.background.is_none() && self.disposable.is_none()
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySet")
            .field("configurable", &self.configurable.is_some())
            .field("background", &self.background.is_some())
            .field("disposable", &self.disposable.is_some())
            .finish()
    }
}
