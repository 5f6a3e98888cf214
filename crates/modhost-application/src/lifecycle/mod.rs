//! Module lifecycle
//!
//! - [`settings`]: startup jitter windows and drain diagnostics interval
//! - [`unload`]: the per-module unload coordinator

pub mod settings;
pub mod unload;

pub use settings::{JitterWindow, LifecycleSettings};
pub use unload::{
    ConstructionGuard, DrainReport, TaskCompletion, TaskOutcome, UnloadCoordinator, UnloadState,
};
