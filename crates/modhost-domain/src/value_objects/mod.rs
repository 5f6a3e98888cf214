//! Value objects
//!
//! Immutable identity and reference types used across the runtime.

mod module_id;
mod secret_reference;

pub use module_id::ModuleId;
pub use secret_reference::{InvalidSecretReference, SecretReference, SecretScheme};
