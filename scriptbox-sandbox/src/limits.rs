//! Resource limits configuration for sandboxed execution

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default V8 heap ceiling (128 MiB).
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 128 * 1024 * 1024;

/// Default cap on each captured console stream (4 MiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

/// Default watchdog poll interval.
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_millis(100);

/// Resource limits enforced on every isolate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Heap ceiling in bytes (`None` leaves V8's own default in place)
    pub max_memory_bytes: Option<usize>,

    /// How often the watchdog checks the deadline
    #[serde(with = "humantime_serde")]
    pub watchdog_interval: Duration,

    /// Bytes kept per console stream; output past it is dropped
    pub max_output_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: Some(DEFAULT_MAX_MEMORY_BYTES),
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ResourceLimits {
    /// Create strict limits for untrusted code
    pub fn strict() -> Self {
        Self {
            max_memory_bytes: Some(32 * 1024 * 1024), // 32 MB
            watchdog_interval: Duration::from_millis(25),
            max_output_bytes: 1024 * 1024,
        }
    }

    /// Create permissive limits for trusted code
    pub fn permissive() -> Self {
        Self {
            max_memory_bytes: Some(512 * 1024 * 1024), // 512 MB
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            max_output_bytes: 16 * 1024 * 1024,
        }
    }

    /// Override the heap ceiling
    pub fn with_max_memory_bytes(mut self, bytes: usize) -> Self {
        self.max_memory_bytes = Some(bytes);
        self
    }

    /// Override the per-stream console output cap
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Override the watchdog interval
    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }
}
