//! In-memory configuration source
//!
//! Backs modules built without a host configuration file (embedding, tests).
//! The infrastructure crate provides the figment-backed source used by the
//! host.

use std::sync::Arc;

use serde_json::{Map, Value};

use modhost_domain::ports::{ConfigScope, ConfigSource};

/// Configuration source over a JSON object of sections
#[derive(Debug, Clone, Default)]
pub struct JsonConfigSource {
    sections: Map<String, Value>,
}

impl JsonConfigSource {
    /// Source with no sections
    pub fn empty() -> Self {
        Self::default()
    }

    /// Source over a JSON object; non-object values yield an empty source
    pub fn new(root: Value) -> Self {
        match root {
            Value::Object(sections) => Self { sections },
            _ => Self::default(),
        }
    }

    /// Add or replace a section
    #[must_use]
    pub fn with_section(mut self, name: impl Into<String>, section: Value) -> Self {
        self.sections.insert(name.into(), section);
        self
    }
}

impl ConfigSource for JsonConfigSource {
    fn scope(&self, section: &str) -> Option<Arc<dyn ConfigScope>> {
        let (head, rest) = match section.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (section, None),
        };
        let top = self.sections.get(head)?;
        let value = match rest {
            Some(rest) => lookup(top, rest)?,
            None => top.clone(),
        };
        value.is_object().then(|| {
            Arc::new(JsonConfigScope {
                name: section.to_string(),
                root: value,
            }) as Arc<dyn ConfigScope>
        })
    }
}

/// One section of a [`JsonConfigSource`]
#[derive(Debug, Clone)]
pub struct JsonConfigScope {
    name: String,
    root: Value,
}

impl JsonConfigScope {
    pub fn new(name: impl Into<String>, root: Value) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }
}

impl ConfigScope for JsonConfigScope {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self, key: &str) -> Option<Value> {
        lookup(&self.root, key)
    }
}

/// Dotted-path lookup through nested objects
pub(crate) fn lookup(root: &Value, path: &str) -> Option<Value> {
    path.split('.')
        .try_fold(root, |value, segment| value.get(segment))
        .cloned()
}
