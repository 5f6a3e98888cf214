//! Module secrets
//!
//! - [`store`]: named secret references, parsed once and fetched on demand
//! - [`value`]: fetched plaintext, zeroed when released

pub mod store;
pub mod value;

pub use store::{SecretHandle, SecretStore};
pub use value::SecretValue;
