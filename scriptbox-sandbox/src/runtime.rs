//! Runtime trait and implementations

pub mod v8;

use crate::types::{ExecutionRequest, ExecutionResult};
use async_trait::async_trait;

pub use v8::V8Runtime;

/// Runtime abstraction for executing a bundled module.
///
/// Implementations never fail: timeouts, resource exhaustion and script
/// errors are all encoded in the returned [`ExecutionResult`].
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Execute code and return its outcome
    async fn execute(&self, request: ExecutionRequest) -> ExecutionResult;

    /// Get runtime name
    fn name(&self) -> &str;
}
