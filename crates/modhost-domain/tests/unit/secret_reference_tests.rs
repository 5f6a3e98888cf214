//! Unit tests for secret reference parsing

use modhost_domain::{SecretReference, SecretScheme};
use std::path::PathBuf;

#[test]
fn test_plain_value_is_literal() {
    let reference = SecretReference::parse("hunter2").expect("literal parses");
    assert_eq!(reference.scheme(), SecretScheme::Literal);
    match reference {
        SecretReference::Literal(value) => assert_eq!(value.as_str(), "hunter2"),
        other => panic!("Expected literal, got {other:?}"),
    }
}

#[test]
fn test_unknown_prefix_is_literal() {
    let reference = SecretReference::parse("https://example.com").expect("literal parses");
    assert_eq!(reference.scheme(), SecretScheme::Literal);
}

#[test]
fn test_env_reference() {
    let reference = SecretReference::parse("env://DB_PASSWORD").expect("env parses");
    assert_eq!(
        reference,
        SecretReference::Env {
            variable: "DB_PASSWORD".to_string()
        }
    );
}

#[test]
fn test_file_reference() {
    let reference = SecretReference::parse("file:///run/secrets/token").expect("file parses");
    assert_eq!(
        reference,
        SecretReference::File {
            path: PathBuf::from("/run/secrets/token")
        }
    );
}

#[test]
fn test_vault_reference() {
    let reference =
        SecretReference::parse("vault://kv/apps/billing?secret=api_key").expect("vault parses");
    assert_eq!(
        reference,
        SecretReference::Vault {
            mount: "kv".to_string(),
            path: "apps/billing".to_string(),
            key: "api_key".to_string(),
        }
    );
}

#[test]
fn test_vault_reference_without_key_is_rejected() {
    let error = SecretReference::parse("vault://kv/apps/billing").expect_err("missing key");
    assert_eq!(error.scheme, SecretScheme::Vault);

    let error = SecretReference::parse("vault://kv/apps?other=x").expect_err("wrong param");
    assert_eq!(error.scheme, SecretScheme::Vault);
}

#[test]
fn test_empty_env_reference_is_rejected() {
    let error = SecretReference::parse("env://").expect_err("empty variable");
    assert_eq!(error.scheme, SecretScheme::Env);
}

#[test]
fn test_literal_debug_is_redacted() {
    let reference = SecretReference::parse("hunter2").expect("literal parses");
    let debug = format!("{reference:?}");
    assert!(!debug.contains("hunter2"));
    assert!(debug.contains("REDACTED"));
}
