//! Modules shipped with the `modhost` binary
//!
//! - [`heartbeat`]: logs a message on a fixed interval until unloaded

pub mod heartbeat;

pub use heartbeat::Heartbeat;
