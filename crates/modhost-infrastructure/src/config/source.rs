//! Figment-backed module configuration view
//!
//! A module sees the host's `[services]` sections with its manifest's
//! `[config]` table merged on top, so a module can override a host-wide
//! section key by key.

use std::path::Path;
use std::sync::Arc;

use figment::Figment;
use figment::providers::{Format, Serialized, Toml};
use figment::value::Value as FigmentValue;
use serde_json::{Map, Value};

use modhost_domain::ports::{ConfigScope, ConfigSource};

use crate::constants::MODULE_CONFIG_TABLE;

/// Configuration source over a figment
#[derive(Debug, Clone)]
pub struct FigmentConfigSource {
    figment: Figment,
}

impl FigmentConfigSource {
    pub fn new(figment: Figment) -> Self {
        Self { figment }
    }

    /// Host service sections overlaid with a module manifest's `[config]` table
    pub fn for_module(services: &Map<String, Value>, manifest: &Path) -> Self {
        let overlay = Figment::from(Toml::file(manifest)).focus(MODULE_CONFIG_TABLE);
        Self::new(
            Figment::new()
                .merge(Serialized::defaults(services.clone()))
                .merge(overlay),
        )
    }

    pub fn figment(&self) -> &Figment {
        &self.figment
    }
}

impl ConfigSource for FigmentConfigSource {
    fn scope(&self, section: &str) -> Option<Arc<dyn ConfigScope>> {
        let root = self.figment.find_value(section).ok()?;
        root.as_dict().is_some().then(|| {
            Arc::new(FigmentConfigScope {
                name: section.to_string(),
                root,
            }) as Arc<dyn ConfigScope>
        })
    }
}

/// One section of a [`FigmentConfigSource`]
#[derive(Debug, Clone)]
pub struct FigmentConfigScope {
    name: String,
    root: FigmentValue,
}

impl ConfigScope for FigmentConfigScope {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self, key: &str) -> Option<Value> {
        self.root.find_ref(key)?.deserialize::<Value>().ok()
    }
}
