//! Unit tests for the typed configuration getters

use modhost_domain::ErrorKind;
use modhost_domain::ports::{ConfigScope, ConfigScopeExt};
use serde_json::{Value, json};

struct JsonScope {
    name: String,
    values: Value,
}

impl ConfigScope for JsonScope {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self, key: &str) -> Option<Value> {
        key.split('.')
            .try_fold(&self.values, |node, part| node.get(part))
            .cloned()
    }
}

fn scope() -> JsonScope {
    JsonScope {
        name: "mailer".to_string(),
        values: json!({ "host": "smtp.local", "port": 2525, "retry": { "attempts": 3 } }),
    }
}

#[test]
fn test_typed_get() {
    let scope = scope();
    let port: Option<u16> = scope.get("port").expect("port is a number");
    assert_eq!(port, Some(2525));
    let attempts: u32 = scope.require("retry.attempts").expect("nested key");
    assert_eq!(attempts, 3);
}

#[test]
fn test_missing_key_is_none_or_not_found() {
    let scope = scope();
    let missing: Option<String> = scope.get("user").expect("absent is not an error");
    assert!(missing.is_none());

    let error = scope.require::<String>("user").expect_err("required key");
    assert_eq!(error.kind(), ErrorKind::NotFound);
}

#[test]
fn test_wrong_type_is_configuration_invalid() {
    let scope = scope();
    let error = scope.get::<u16>("host").expect_err("host is not a number");
    assert_eq!(error.kind(), ErrorKind::ConfigurationInvalid);
    assert!(error.to_string().contains("mailer"));
}

#[test]
fn test_contains_through_trait_object() {
    let scope: Box<dyn ConfigScope> = Box::new(scope());
    assert!(scope.contains("host"));
    assert!(!scope.contains("password"));
    let host: String = scope.require("host").expect("host present");
    assert_eq!(host, "smtp.local");
}
