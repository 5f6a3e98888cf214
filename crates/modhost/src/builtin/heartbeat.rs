//! Heartbeat module
//!
//! A module directory with `entry = "heartbeat"` logs its message every
//! `interval_ms` until the module unloads:
//!
//! ```toml
//! entry = "heartbeat"
//!
//! [config.heartbeat]
//! interval_ms = 5000
//! message = "still here"
//! ```
//!
//! The same service is exported as the linked unit `heartbeat`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use linkme::distributed_slice;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use modhost_application::ports::registry::{
    LINKED_UNITS, LinkedUnitEntry, MODULE_ENTRIES, ModuleEntry,
};
use modhost_application::{
    AsyncConfigurable, BackgroundWork, Capabilities, Disposable, Module, ServiceCatalog,
    ServiceDescriptor,
};
use modhost_domain::ports::{ConfigScope, ConfigScopeExt};

/// Configuration section read by [`Heartbeat`]
pub const HEARTBEAT_SECTION: &str = "heartbeat";

const DEFAULT_INTERVAL_MS: u64 = 1000;
const DEFAULT_MESSAGE: &str = "heartbeat";

/// Periodic log line, counted
pub struct Heartbeat {
    interval: Duration,
    message: String,
    beats: AtomicU64,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_INTERVAL_MS), DEFAULT_MESSAGE)
    }
}

impl Heartbeat {
    pub fn new(interval: Duration, message: impl Into<String>) -> Self {
        Self {
            interval,
            message: message.into(),
            beats: AtomicU64::new(0),
        }
    }

    /// Heartbeat from the `heartbeat` section; absent keys keep their defaults
    pub fn from_config(scope: &dyn ConfigScope) -> anyhow::Result<Self> {
        let interval_ms = scope.get::<u64>("interval_ms")?.unwrap_or(DEFAULT_INTERVAL_MS);
        let message = scope
            .get::<String>("message")?
            .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
        Ok(Self::new(Duration::from_millis(interval_ms), message))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Beats logged so far
    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::SeqCst)
    }

    /// Blueprint registering the heartbeat as a module service
    pub fn descriptor() -> ServiceDescriptor<Self> {
        ServiceDescriptor::new()
            .config_section(HEARTBEAT_SECTION)
            .validate(|scope| match scope.get::<u64>("interval_ms") {
                Ok(Some(0)) => Err("interval_ms must be positive".to_string()),
                Ok(_) => Ok(()),
                Err(e) => Err(e.to_string()),
            })
            .with_config(|_, scope| Self::from_config(scope.as_ref()))
            .with_default(|| Ok(Self::default()))
    }
}

impl Capabilities for Heartbeat {
    fn as_configurable(self: Arc<Self>) -> Option<Arc<dyn AsyncConfigurable>> {
        Some(self)
    }

    fn as_background_work(self: Arc<Self>) -> Option<Arc<dyn BackgroundWork>> {
        Some(self)
    }

    fn as_disposable(self: Arc<Self>) -> Option<Arc<dyn Disposable>> {
        Some(self)
    }
}

#[async_trait]
impl AsyncConfigurable for Heartbeat {
    async fn configure(&self, module: &Module) -> anyhow::Result<()> {
        debug!(
            module = %module.id(),
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Heartbeat configured"
        );
        Ok(())
    }
}

#[async_trait]
impl BackgroundWork for Heartbeat {
    async fn run(&self, span: tracing::Span, cancel: CancellationToken) -> anyhow::Result<()> {
        // tokio::time::interval panics on a zero period
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let beat = self.beats.fetch_add(1, Ordering::SeqCst) + 1;
                    info!(parent: &span, beat, "{}", self.message);
                }
            }
        }
        Ok(())
    }
}

impl Disposable for Heartbeat {
    fn dispose(&self) {
        info!(beats = self.beats(), "Heartbeat stopped");
    }
}

// ============================================================================
// Registrations
// ============================================================================

fn register(catalog: &mut ServiceCatalog) {
    catalog.register(Heartbeat::descriptor());
}

fn boot(module: Module) -> BoxFuture<'static, anyhow::Result<()>> {
    Box::pin(async move {
        module.service::<Heartbeat>().await?;
        Ok(())
    })
}

fn exports() -> ServiceCatalog {
    ServiceCatalog::new().with(Heartbeat::descriptor())
}

#[distributed_slice(MODULE_ENTRIES)]
static HEARTBEAT_MODULE: ModuleEntry = ModuleEntry {
    name: "heartbeat",
    description: "Logs a message on a fixed interval",
    register,
    boot,
};

#[distributed_slice(LINKED_UNITS)]
static HEARTBEAT_UNIT: LinkedUnitEntry = LinkedUnitEntry {
    name: "heartbeat",
    description: "Heartbeat service as a loadable unit",
    exports,
};
