//! Lifecycle settings
//!
//! Services constructed together would otherwise all start configuring (and
//! then all start background work) in the same instant. Each hook is delayed
//! by a random duration drawn from its jitter window.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use modhost_domain::{Error, Result};

/// Inclusive range of startup delays, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl JitterWindow {
    /// No delay at all
    pub const ZERO: Self = Self::new(0, 0);

    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Draw a delay from the window
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::rng().random_range(self.min_ms..=self.max_ms))
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.min_ms > self.max_ms {
            return Err(Error::configuration(format!(
                "{name}: min_ms ({}) exceeds max_ms ({})",
                self.min_ms, self.max_ms
            )));
        }
        Ok(())
    }
}

/// Startup jitter and drain diagnostics for a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    /// Delay before a service's configure hook runs
    pub configure_jitter: JitterWindow,
    /// Delay before a service's background work starts
    pub background_jitter: JitterWindow,
    /// How often a stalled drain logs the tasks it is waiting on
    pub drain_warn_interval_secs: u64,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            configure_jitter: JitterWindow::new(10, 50),
            background_jitter: JitterWindow::new(100, 500),
            drain_warn_interval_secs: 10,
        }
    }
}

impl LifecycleSettings {
    /// Settings with every delay removed
    pub fn immediate() -> Self {
        Self {
            configure_jitter: JitterWindow::ZERO,
            background_jitter: JitterWindow::ZERO,
            ..Self::default()
        }
    }

    pub fn configure_delay(&self) -> Duration {
        self.configure_jitter.sample()
    }

    pub fn background_delay(&self) -> Duration {
        self.background_jitter.sample()
    }

    pub fn drain_warn_interval(&self) -> Duration {
        Duration::from_secs(self.drain_warn_interval_secs.max(1))
    }

    /// Reject inverted windows
    pub fn validate(&self) -> Result<()> {
        self.configure_jitter.validate("configure_jitter")?;
        self.background_jitter.validate("background_jitter")
    }
}
