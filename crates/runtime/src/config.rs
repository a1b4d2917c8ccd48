use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 50;

/// Polling parameters for [`crate::ResourceLoader`].
///
/// The defaults give a budget of roughly five seconds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl LoaderConfig {
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            poll_interval_ms: poll_interval.as_millis() as u64,
            max_attempts,
        }
    }

    /// Interval between probes. Never zero, so the loop always yields.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Attempt ceiling. At least one probe is always made.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Total wait before the loader gives up.
    pub fn budget(&self) -> Duration {
        self.poll_interval() * self.max_attempts()
    }
}
