//! Shared fixtures for the application test suite

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use modhost_application::loader::DependencyResolver;
use modhost_application::ports::{IsolationContext, UnitLoader};
use modhost_application::{Capabilities, LifecycleSettings, Module, ServiceCatalog};
use modhost_domain::{Error, Result};

// ============================================================================
// Services
// ============================================================================

pub trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

/// Greeter tagged with the construction that produced it
pub struct CountingGreeter {
    pub id: usize,
}

impl Capabilities for CountingGreeter {}

impl Greeter for CountingGreeter {
    fn greet(&self) -> String {
        format!("hello #{}", self.id)
    }
}

pub struct FrenchGreeter;

impl Capabilities for FrenchGreeter {}

impl Greeter for FrenchGreeter {
    fn greet(&self) -> String {
        "bonjour".to_string()
    }
}

// ============================================================================
// Modules
// ============================================================================

/// Module over `catalog` with all startup jitter removed
pub fn module_with(catalog: ServiceCatalog) -> Module {
    Module::builder("test", std::env::temp_dir())
        .catalog(catalog)
        .settings(LifecycleSettings::immediate())
        .build()
        .expect("module")
}

pub async fn noop() -> anyhow::Result<()> {
    Ok(())
}

/// Poll `condition` every 5ms until it holds or `timeout` elapses
pub async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

// ============================================================================
// Units
// ============================================================================

/// Unit loader reading a unit file of the form
///
/// ```text
/// <unit name>
/// <dependency>
/// ...
/// ```
#[derive(Default)]
pub struct ListingUnitLoader {
    units: HashMap<&'static str, fn() -> ServiceCatalog>,
    pub released: Arc<AtomicUsize>,
    pub loads: Arc<AtomicUsize>,
}

impl ListingUnitLoader {
    pub fn with_unit(mut self, name: &'static str, exports: fn() -> ServiceCatalog) -> Self {
        self.units.insert(name, exports);
        self
    }
}

impl UnitLoader for ListingUnitLoader {
    fn load(&self, path: &Path, resolver: &DependencyResolver) -> Result<Box<dyn IsolationContext>> {
        let listing = std::fs::read_to_string(path)?;
        let mut lines = listing.lines().map(str::trim).filter(|line| !line.is_empty());
        let name = lines
            .next()
            .ok_or_else(|| Error::not_found(format!("unit name in {}", path.display())))?;
        for dependency in lines {
            resolver.resolve(name, dependency)?;
        }
        let exports = self
            .units
            .get(name)
            .ok_or_else(|| Error::not_found(format!("unit '{name}'")))?;

        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ListedUnit {
            name: name.to_string(),
            exports: exports(),
            released: Arc::clone(&self.released),
        }))
    }

    fn loader_name(&self) -> &str {
        "listing"
    }
}

struct ListedUnit {
    name: String,
    exports: ServiceCatalog,
    released: Arc<AtomicUsize>,
}

impl IsolationContext for ListedUnit {
    fn unit_name(&self) -> &str {
        &self.name
    }

    fn exports(&self) -> &ServiceCatalog {
        &self.exports
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Write a unit listing into `dir` and return its path
pub fn write_unit(dir: &Path, file: &str, name: &str, dependencies: &[&str]) -> std::path::PathBuf {
    let path = dir.join(file);
    let mut listing = format!("{name}\n");
    for dependency in dependencies {
        listing.push_str(dependency);
        listing.push('\n');
    }
    std::fs::write(&path, listing).expect("write unit");
    path
}
