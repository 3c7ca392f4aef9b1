//! Core types for sandbox execution

use crate::sourcemap::SourceMap;
use scriptbox_common::Diagnostic;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Exit code reported when the deadline was hit
pub const EXIT_TIMEOUT: i32 = 124;

/// Unique execution identifier, used to correlate log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub uuid::Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request to execute a bundled module
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// The bundled JavaScript to execute
    pub code: String,

    /// Script name reported in stack traces
    pub entry_name: String,

    /// Map from the bundle back to the original sources
    pub source_map: Option<SourceMap>,

    /// Wall-clock budget
    pub timeout: Duration,

    /// Caller-side cancellation, observed by the watchdog alongside the deadline
    pub cancel: Option<CancellationToken>,
}

impl ExecutionRequest {
    /// Create a request with the default 10 second budget
    pub fn new(code: impl Into<String>, entry_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            entry_name: entry_name.into(),
            source_map: None,
            timeout: Duration::from_millis(scriptbox_common::DEFAULT_TIMEOUT_MS),
            cancel: None,
        }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attach a source map for diagnostic resolution
    pub fn with_source_map(mut self, source_map: Option<SourceMap>) -> Self {
        self.source_map = source_map;
        self
    }

    /// Attach a cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Result of one execution attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Captured `console.log` / `console.info` output
    pub stdout: String,

    /// Captured `console.warn` / `console.error` output plus engine annotations
    pub stderr: String,

    /// Exit code (0 = success, 124 = timeout)
    pub exit_code: i32,

    /// Whether the script finished without error
    pub success: bool,

    /// Execution duration in milliseconds
    pub duration_ms: u64,

    /// One-line human readable outcome
    pub summary: String,

    /// Runtime diagnostic (if any) followed by bundler warnings
    pub diagnostics: Vec<Diagnostic>,
}

impl ExecutionResult {
    /// Whether the outcome was a deadline hit
    pub fn timed_out(&self) -> bool {
        self.exit_code == EXIT_TIMEOUT
    }

    /// Whether a transport should flag this result as an error
    pub fn is_error(&self) -> bool {
        !self.success && self.exit_code != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_serializes_camel_case() {
        let result = ExecutionResult {
            stdout: "a b\n".into(),
            stderr: String::new(),
            exit_code: 0,
            success: true,
            duration_ms: 12,
            summary: "Execution finished successfully".into(),
            diagnostics: Vec::new(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["exitCode"], 0);
        assert_eq!(json["durationMs"], 12);
        assert_eq!(json["success"], true);
        assert!(json["diagnostics"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_request_builder() {
        let request = ExecutionRequest::new("1", "main.ts").with_timeout(Duration::from_millis(500));
        assert_eq!(request.entry_name, "main.ts");
        assert_eq!(request.timeout, Duration::from_millis(500));
        assert!(request.source_map.is_none());
        assert!(request.cancel.is_none());
    }
}
