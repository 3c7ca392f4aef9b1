//! Common test utilities shared across integration tests

#![allow(dead_code)]

use scriptbox_sandbox::{PassthroughBundler, ResourceLimits, SandboxService, V8Runtime};
use std::time::Duration;

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Limits with a short watchdog interval so deadline tests stay fast
pub fn test_limits() -> ResourceLimits {
    ResourceLimits::default().with_watchdog_interval(Duration::from_millis(20))
}

/// V8 runtime behind the passthrough bundler; needs no external tools
pub fn passthrough_service() -> SandboxService {
    SandboxService::new(V8Runtime::with_limits(test_limits()), PassthroughBundler)
}
