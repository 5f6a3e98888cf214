//! Configuration ports
//!
//! A [`ConfigSource`] is a module's whole configuration view (host settings
//! with the module-local overlay applied). A [`ConfigScope`] is one named
//! section of it, handed to services that declare a configuration name.

use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Named-property lookup over one configuration section
pub trait ConfigScope: Send + Sync {
    /// Section name this scope was created for
    fn name(&self) -> &str;

    /// Raw value of a property, `None` when absent
    ///
    /// Dotted keys address nested tables (`"retry.attempts"`).
    fn value(&self, key: &str) -> Option<serde_json::Value>;

    /// Whether a property is present
    fn contains(&self, key: &str) -> bool {
        self.value(key).is_some()
    }
}

/// A module's configuration view
pub trait ConfigSource: Send + Sync {
    /// Scope for a section, `None` when the section does not exist
    fn scope(&self, section: &str) -> Option<Arc<dyn ConfigScope>>;
}

/// Typed getters over [`ConfigScope`]
pub trait ConfigScopeExt {
    /// Typed property lookup; absent properties yield `Ok(None)`
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>;

    /// Typed property lookup that fails with `NotFound` when absent
    fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T>;
}

impl<S: ConfigScope + ?Sized> ConfigScopeExt for S {
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.value(key) else {
            return Ok(None);
        };
        serde_json::from_value(value).map(Some).map_err(|e| {
            Error::configuration_invalid(self.name(), format!("property '{key}': {e}"))
        })
    }

    fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get(key)?.ok_or_else(|| {
            Error::not_found(format!("configuration property '{}.{}'", self.name(), key))
        })
    }
}
