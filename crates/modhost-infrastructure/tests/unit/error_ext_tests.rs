//! Error extension tests

use std::io;

use modhost_domain::{Error, ErrorKind, Result};
use modhost_infrastructure::error_ext::ErrorContext;

#[test]
fn test_io_context_keeps_source() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");

    let result: Result<()> = Err(io_error).io_context("failed to read manifest");

    match result {
        Err(Error::Io { message, source }) => {
            assert!(message.contains("failed to read manifest"));
            assert!(message.contains("file not found"));
            assert!(source.is_some());
        }
        other => panic!("expected Io error, got {other:?}"),
    }
}

#[test]
fn test_config_context() {
    let parse_error = "x".parse::<u32>().expect_err("not a number");
    let err = Err::<u32, _>(parse_error)
        .config_context("invalid port")
        .expect_err("config error");
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("invalid port"));
}

#[test]
fn test_lazy_context_is_internal() {
    let err = Err::<(), _>(io::Error::other("boom"))
        .with_context(|| format!("step {}", 3))
        .expect_err("internal");
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("step 3: boom"));
}
