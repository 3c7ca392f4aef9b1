//! V8 JavaScript runtime using deno_core
//!
//! Every call gets a fresh isolate on a blocking thread. Nothing survives
//! between executions: globals, op state, heap and clock epoch are all
//! created and dropped with the isolate.

mod host;
mod outcome;
mod script;
mod watchdog;

use crate::limits::ResourceLimits;
use crate::types::{ExecutionRequest, ExecutionResult};
use async_trait::async_trait;
use deno_core::{JsRuntime, RuntimeOptions};
use std::time::Instant;

use outcome::IsolateRun;
use watchdog::Watchdog;

pub use outcome::{parse_location, BUNDLE_SOURCE};

/// V8 JavaScript runtime
#[derive(Debug, Clone, Default)]
pub struct V8Runtime {
    /// Resource limits for execution
    limits: ResourceLimits,
}

impl V8Runtime {
    /// Create a new V8 runtime with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create V8 runtime with custom resource limits
    pub fn with_limits(limits: ResourceLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }
}

#[async_trait]
impl super::Runtime for V8Runtime {
    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let limits = self.limits.clone();
        let start = Instant::now();

        let task_handle = tokio::task::spawn_blocking(move || run_isolate(request, limits, start));

        match task_handle.await {
            Ok(result) => result,
            Err(join_err) => {
                tracing::error!(error = %join_err, "V8 execution task failed");
                failure(start, format!("Task panicked: {}", join_err))
            }
        }
    }

    fn name(&self) -> &str {
        "v8"
    }
}

fn create_isolate(limits: &ResourceLimits) -> JsRuntime {
    let mut runtime_options = RuntimeOptions {
        extensions: vec![host::host_extension()],
        ..Default::default()
    };

    if let Some(max_bytes) = limits.max_memory_bytes {
        // Initial heap is 10% of the ceiling, capped at 10MB
        let initial_bytes = (max_bytes / 10).min(10 * 1024 * 1024);
        runtime_options.create_params =
            Some(deno_core::v8::CreateParams::default().heap_limits(initial_bytes, max_bytes));
    }

    JsRuntime::new(runtime_options)
}

fn run_isolate(request: ExecutionRequest, limits: ResourceLimits, start: Instant) -> ExecutionResult {
    let ExecutionRequest {
        code,
        entry_name,
        source_map,
        timeout,
        cancel,
    } = request;
    let deadline = start + timeout;

    let mut runtime = create_isolate(&limits);
    if let Err(err) = host::install(&mut runtime, limits.max_output_bytes) {
        tracing::error!(error = %err, "Failed to install host globals");
        return failure(start, format!("Failed to initialize isolate: {}", err));
    }

    let handle = runtime.v8_isolate().thread_safe_handle();
    let watchdog = match Watchdog::spawn(handle, deadline, cancel, limits.watchdog_interval) {
        Ok(watchdog) => watchdog,
        Err(err) => {
            tracing::error!(error = %err, "Failed to spawn watchdog");
            return failure(start, format!("Failed to start watchdog: {}", err));
        }
    };

    if limits.max_memory_bytes.is_some() {
        let mut alarm = watchdog.heap_alarm();
        runtime.add_near_heap_limit_callback(move |current_limit, _initial_limit| {
            alarm.raise(current_limit);
            // Headroom so V8 can unwind while the watchdog terminates it
            current_limit.saturating_mul(2)
        });
    }

    let outcome = script::run_entry(&mut runtime, &entry_name, &code);
    let verdict = watchdog.stop();

    let mut stats = deno_core::v8::HeapStatistics::default();
    runtime.v8_isolate().get_heap_statistics(&mut stats);

    let run = IsolateRun {
        deadline_passed: outcome.is_err() && Instant::now() >= deadline,
        outcome,
        verdict,
        heap_used_bytes: stats.used_heap_size(),
        console: host::take_console(&mut runtime),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    tracing::debug!(
        entry = %entry_name,
        duration_ms = run.duration_ms,
        heap_used_bytes = run.heap_used_bytes,
        ?verdict,
        "Isolate finished"
    );

    outcome::classify(run, source_map.as_ref(), limits.max_memory_bytes)
}

/// Result for failures outside the script itself
fn failure(start: Instant, message: String) -> ExecutionResult {
    ExecutionResult {
        stdout: String::new(),
        stderr: format!("{}\n", message),
        exit_code: 1,
        success: false,
        duration_ms: start.elapsed().as_millis() as u64,
        summary: "Execution terminated (internal error or forced stop)".to_string(),
        diagnostics: vec![scriptbox_common::Diagnostic::error(message)],
    }
}
