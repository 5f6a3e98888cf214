//! Configuration loader tests

use std::env;

use modhost_domain::ErrorKind;
use modhost_infrastructure::config::{ConfigLoader, HostConfig};

use crate::support::write_file;

#[test]
fn test_defaults_without_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_file(dir.path(), "modhost.toml", "");

    let config = ConfigLoader::new()
        .with_env_prefix("MODHOST_TEST_DEFAULTS_")
        .with_config_path(&path)
        .load()
        .expect("load");

    assert_eq!(config.logging.level, "info");
    assert!(!config.logging.json_format);
    assert_eq!(config.modules.search_paths.len(), 1);
    assert!(config.secrets.vault.is_none());
    assert!(config.services.is_empty());
}

#[test]
fn test_file_values_override_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_file(
        dir.path(),
        "modhost.toml",
        r#"
[logging]
level = "debug"
json_format = true

[modules]
search_paths = ["/srv/modules", "/opt/modules"]
shared_dependency_paths = ["/srv/shared"]

[lifecycle]
drain_warn_interval_secs = 3

[lifecycle.configure_jitter]
min_ms = 0
max_ms = 0

[secrets.vault]
address = "https://vault.internal:8200"

[services.fetcher]
url = "http://localhost:9000"
"#,
    );

    let config = ConfigLoader::new()
        .with_env_prefix("MODHOST_TEST_FILE_")
        .with_config_path(&path)
        .load()
        .expect("load");

    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json_format);
    assert_eq!(config.modules.search_paths.len(), 2);
    assert_eq!(config.modules.shared_dependency_paths.len(), 1);
    assert_eq!(config.lifecycle.drain_warn_interval_secs, 3);
    assert_eq!(config.lifecycle.configure_jitter.max_ms, 0);
    // Untouched windows keep their defaults
    assert_eq!(
        config.lifecycle.background_jitter,
        HostConfig::default().lifecycle.background_jitter
    );

    let vault = config.secrets.vault.expect("vault");
    assert_eq!(vault.address, "https://vault.internal:8200");
    assert_eq!(vault.token_env, "VAULT_TOKEN");
    assert_eq!(
        config.services["fetcher"]["url"],
        serde_json::json!("http://localhost:9000")
    );
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = ConfigLoader::new()
        .with_config_path(dir.path().join("absent.toml"))
        .load()
        .expect_err("missing file");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_validation_rejects_bad_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cases = [
        ("level.toml", "[logging]\nlevel = \"loud\"\n"),
        (
            "jitter.toml",
            "[lifecycle.background_jitter]\nmin_ms = 50\nmax_ms = 10\n",
        ),
        ("vault.toml", "[secrets.vault]\naddress = \"vault.internal\"\n"),
        ("paths.toml", "[modules]\nsearch_paths = []\n"),
    ];

    for (name, contents) in cases {
        let path = write_file(dir.path(), name, contents);
        let err = ConfigLoader::new()
            .with_env_prefix("MODHOST_TEST_VALIDATION_")
            .with_config_path(&path)
            .load()
            .expect_err(name);
        assert_eq!(err.kind(), ErrorKind::Configuration, "{name}: {err}");
    }
}

#[test]
fn test_save_then_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("saved.toml");
    let loader = ConfigLoader::new()
        .with_env_prefix("MODHOST_TEST_SAVE_")
        .with_config_path(&path);

    let mut config = HostConfig::default();
    config.logging.level = "warn".to_string();
    loader.save_to_file(&config, &path).expect("save");

    let loaded = loader.load().expect("load");
    assert_eq!(loaded.logging.level, "warn");
}

/// Environment variables override the file, `__` separating nested keys
///
/// Run with: `cargo test -p modhost-infrastructure --test unit -- --ignored --test-threads=1`
#[test]
#[ignore = "mutates the process environment"]
fn test_env_overrides_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_file(dir.path(), "modhost.toml", "[logging]\nlevel = \"debug\"\n");

    // SAFETY: run with --test-threads=1
    unsafe {
        env::set_var("MODHOST_TEST_ENV_LOGGING__LEVEL", "error");
        env::set_var("MODHOST_TEST_ENV_LIFECYCLE__DRAIN_WARN_INTERVAL_SECS", "7");
    }

    let config = ConfigLoader::new()
        .with_env_prefix("MODHOST_TEST_ENV_")
        .with_config_path(&path)
        .load();

    // SAFETY: run with --test-threads=1
    unsafe {
        env::remove_var("MODHOST_TEST_ENV_LOGGING__LEVEL");
        env::remove_var("MODHOST_TEST_ENV_LIFECYCLE__DRAIN_WARN_INTERVAL_SECS");
    }

    let config = config.expect("load");
    assert_eq!(config.logging.level, "error");
    assert_eq!(config.lifecycle.drain_warn_interval_secs, 7);
}
