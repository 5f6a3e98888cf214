//! # modhost Domain Layer
//!
//! Core types shared by every layer of the module runtime.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error taxonomy and `Result` alias |
//! | [`value_objects`] | Module identity and secret references |
//! | [`ports`] | Narrow interfaces to external collaborators (configuration, vault) |
//! | [`constants`] | Scheme prefixes and well-known names |
//!
//! The domain crate has no runtime dependencies (no tokio, no tracing).

pub mod constants;
pub mod error;
pub mod ports;
pub mod value_objects;

pub use error::{Error, ErrorKind, Result};
pub use value_objects::{ModuleId, SecretReference, SecretScheme};
