//! Module handle tests: assets, secrets and the unload sequence

use modhost_application::{Module, ServiceCatalog, TaskOutcome};
use modhost_domain::ErrorKind;

use crate::support::{module_with, noop};

#[test]
fn test_build_outside_runtime_is_invalid() {
    let err = Module::builder("orphan", std::env::temp_dir())
        .build()
        .expect_err("no runtime");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[test]
fn test_build_with_explicit_runtime() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("runtime");
    let module = Module::builder("hosted", std::env::temp_dir())
        .runtime(runtime.handle().clone())
        .build()
        .expect("module");

    let completion = module.coordinator().observe("outside", noop()).expect("observe");
    let report = module.unload_blocking().expect("unload from plain thread");
    assert_eq!(report.disposed, 0);
    assert_eq!(completion.outcome(), Some(TaskOutcome::Succeeded));
}

#[tokio::test]
async fn test_resolve_asset_prefers_assets_dir() {
    let root = tempfile::tempdir().expect("tempdir");
    let assets = root.path().join("assets");
    let search = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(&assets).expect("mkdir");
    std::fs::write(assets.join("banner.txt"), b"module").expect("write");
    std::fs::write(search.path().join("banner.txt"), b"host").expect("write");
    std::fs::write(search.path().join("shared.txt"), b"host").expect("write");

    let module = Module::builder("assets", root.path())
        .assets_dir(&assets)
        .search_paths(vec![search.path().to_path_buf()])
        .build()
        .expect("module");

    assert_eq!(module.resolve_asset("banner.txt").expect("asset"), assets.join("banner.txt"));
    let err = module.resolve_asset("shared.txt").expect_err("assets dir is exclusive");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_secrets_through_module() {
    let root = tempfile::tempdir().expect("tempdir");
    std::fs::write(root.path().join("token"), b"tok-42").expect("write");

    let module = Module::builder("secrets", root.path())
        .secret("api_token", "file://token")
        .secrets([("greeting".to_string(), "hello".to_string())])
        .build()
        .expect("module");

    let token = module.fetch_secret("api_token").expect("fetch").expect("configured");
    assert_eq!(token.expose_str(), Some("tok-42"));

    let len = module
        .with_secret("greeting", <[u8]>::len)
        .expect("fetch")
        .expect("configured");
    assert_eq!(len, 5);

    let value = module
        .fetch_secret_async("greeting")
        .await
        .expect("fetch")
        .expect("configured");
    assert_eq!(value.expose(), b"hello");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unload_rejects_later_work() {
    let module = Module::builder("closing", std::env::temp_dir())
        .secret("plain", "value")
        .build()
        .expect("module");

    module.unload().await.expect("unload");

    let err = module.fetch_secret("plain").expect_err("fetch after unload");
    assert_eq!(err.kind(), ErrorKind::AlreadyUnloaded);
    let err = module.coordinator().observe("late", noop()).expect_err("observe after unload");
    assert_eq!(err.kind(), ErrorKind::AlreadyUnloaded);
    assert!(!module.signal_unload(), "already signaled");
}

#[tokio::test]
async fn test_drain_requires_signal() {
    let module = module_with(ServiceCatalog::new());
    let err = module.drain().await.expect_err("drain before signal");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(module.signal_unload());
    module.drain().await.expect("drain after signal");
}

#[tokio::test]
async fn test_module_handles_share_state() {
    let module = module_with(ServiceCatalog::new());
    let clone = module.clone();
    assert_eq!(clone.id(), module.id());
    module.signal_unload();
    assert!(clone.coordinator().is_signaled());
    assert!(clone.secrets().names().is_empty());
}
