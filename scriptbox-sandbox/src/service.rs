//! Sandbox service - main entry point
//!
//! Runs the full pipeline for one plan: validate, bundle, execute, then
//! attach bundler warnings. Each stage can short-circuit with a structured
//! failure.

use crate::artifact::{ArtifactError, ArtifactStore};
use crate::bundle::{BundleError, BundleMessage, Bundler, EsbuildBundler};
use crate::config::SandboxConfig;
use crate::runtime::{Runtime, V8Runtime};
use crate::types::{ExecutionId, ExecutionRequest, ExecutionResult};
use scriptbox_common::{
    validate_plan, Diagnostic, ExecutionPlan, Severity, ValidationError, VirtualFile,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Entry name used for ad-hoc scripts
pub const SCRIPT_ENTRY: &str = "script.ts";

/// Entry name used for syntax checks
pub const CHECK_ENTRY: &str = "check.ts";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to read artifact: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("no artifact store configured")]
    NoArtifactStore,

    /// Bundler failures other than compile errors
    #[error("bundle error: {0}")]
    Bundle(BundleError),
}

/// The plan did not compile; nothing was executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildFailure {
    pub summary: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildFailure {
    /// Exit code reported for build failures
    pub const EXIT_CODE: i32 = 1;

    pub fn from_messages(messages: &[BundleMessage]) -> Self {
        let diagnostics: Vec<Diagnostic> = messages
            .iter()
            .map(|message| message.to_diagnostic(Severity::Error))
            .collect();

        let summary = match diagnostics.first() {
            Some(first) => format!("Build Error: {} in {}", first.message, first.location_label()),
            None => "Build failed".to_string(),
        };

        Self {
            summary,
            diagnostics,
        }
    }
}

/// Result of running a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    BuildFailed(BuildFailure),
    Executed(ExecutionResult),
}

impl Outcome {
    pub fn summary(&self) -> &str {
        match self {
            Outcome::BuildFailed(failure) => &failure.summary,
            Outcome::Executed(result) => &result.summary,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, Outcome::Executed(result) if result.success)
    }

    pub fn execution(&self) -> Option<&ExecutionResult> {
        match self {
            Outcome::Executed(result) => Some(result),
            Outcome::BuildFailed(_) => None,
        }
    }
}

/// Result of a compile-only check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxCheck {
    pub success: bool,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Sandbox execution service
#[derive(Clone)]
pub struct SandboxService {
    runtime: Arc<dyn Runtime>,
    bundler: Arc<dyn Bundler>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    default_timeout_ms: u64,
}

impl SandboxService {
    /// Create a new sandbox service with the given runtime and bundler
    pub fn new(runtime: impl Runtime + 'static, bundler: impl Bundler + 'static) -> Self {
        Self {
            runtime: Arc::new(runtime),
            bundler: Arc::new(bundler),
            artifacts: None,
            default_timeout_ms: scriptbox_common::DEFAULT_TIMEOUT_MS,
        }
    }

    /// V8 runtime and esbuild bundler configured from `config`
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self::new(
            V8Runtime::with_limits(config.limits.clone()),
            EsbuildBundler::with_binary(config.bundler.esbuild_path.clone()),
        )
        .with_default_timeout_ms(config.default_timeout_ms)
    }

    pub fn with_artifact_store(mut self, store: impl ArtifactStore + 'static) -> Self {
        self.artifacts = Some(Arc::new(store));
        self
    }

    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    /// Get the runtime name
    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    pub fn bundler_name(&self) -> &str {
        self.bundler.name()
    }

    /// Validate, bundle and execute a plan
    pub async fn run_plan(&self, plan: ExecutionPlan) -> Result<Outcome, ServiceError> {
        self.run(plan, None).await
    }

    /// Like [`run_plan`](Self::run_plan), stopping early when `token` is cancelled
    pub async fn run_plan_with_cancellation(
        &self,
        plan: ExecutionPlan,
        token: CancellationToken,
    ) -> Result<Outcome, ServiceError> {
        self.run(plan, Some(token)).await
    }

    /// Run a single ad-hoc script as `script.ts`
    pub async fn execute_script(
        &self,
        code: impl Into<String>,
        timeout_ms: u64,
    ) -> Result<Outcome, ServiceError> {
        let plan = ExecutionPlan::single_file(SCRIPT_ENTRY, code).with_timeout_ms(timeout_ms);
        self.run_plan(plan).await
    }

    /// Run a multi-file project
    pub async fn execute_project(
        &self,
        files: Vec<VirtualFile>,
        entry_point: impl Into<String>,
        timeout_ms: u64,
    ) -> Result<Outcome, ServiceError> {
        let plan = ExecutionPlan::new(files, entry_point).with_timeout_ms(timeout_ms);
        self.run_plan(plan).await
    }

    /// Run a stored artifact as a single-file plan
    pub async fn execute_artifact(&self, id: &str, timeout_ms: u64) -> Result<Outcome, ServiceError> {
        let store = self.artifacts.as_ref().ok_or(ServiceError::NoArtifactStore)?;
        let artifact = store.read(id).await?;

        tracing::debug!(artifact_id = id, filename = %artifact.filename, "Loaded artifact");

        let plan = ExecutionPlan::single_file(artifact.filename, artifact.content)
            .with_timeout_ms(timeout_ms);
        self.run_plan(plan).await
    }

    /// Compile `code` as `check.ts` without executing it
    pub async fn check_syntax(&self, code: impl Into<String>) -> SyntaxCheck {
        let plan = ExecutionPlan::single_file(CHECK_ENTRY, code);

        match self.bundler.bundle(&plan).await {
            Ok(_) => SyntaxCheck {
                success: true,
                summary: "Syntax is valid".to_string(),
                diagnostics: Vec::new(),
            },
            Err(BundleError::Compile(messages)) => {
                let failure = BuildFailure::from_messages(&messages);
                SyntaxCheck {
                    success: false,
                    summary: failure.summary,
                    diagnostics: failure.diagnostics,
                }
            }
            Err(err) => SyntaxCheck {
                success: false,
                summary: format!("Internal check error: {}", err),
                diagnostics: Vec::new(),
            },
        }
    }

    async fn run(
        &self,
        plan: ExecutionPlan,
        cancel: Option<CancellationToken>,
    ) -> Result<Outcome, ServiceError> {
        let id = ExecutionId::new();
        let span = tracing::info_span!("run_plan", execution_id = %id, entry = %plan.entry_point);
        self.run_in_span(id, plan, cancel).instrument(span).await
    }

    async fn run_in_span(
        &self,
        id: ExecutionId,
        mut plan: ExecutionPlan,
        cancel: Option<CancellationToken>,
    ) -> Result<Outcome, ServiceError> {
        plan.apply_default_timeout(self.default_timeout_ms);
        validate_plan(&mut plan)?;

        let bundle = match self.bundler.bundle(&plan).await {
            Ok(bundle) => bundle,
            Err(BundleError::Compile(messages)) => {
                let failure = BuildFailure::from_messages(&messages);
                tracing::warn!(execution_id = %id, summary = %failure.summary, "Build failed");
                return Ok(Outcome::BuildFailed(failure));
            }
            Err(err) => return Err(ServiceError::Bundle(err)),
        };

        if bundle.source_map.is_none() {
            tracing::debug!(execution_id = %id, "Bundle has no source map, diagnostics stay in bundle terms");
        }

        let mut request = ExecutionRequest::new(bundle.code, plan.entry_point.clone())
            .with_timeout(Duration::from_millis(plan.timeout_ms))
            .with_source_map(bundle.source_map);
        if let Some(token) = cancel {
            request = request.with_cancellation(token);
        }

        let mut result = self.runtime.execute(request).await;
        result.diagnostics.extend(
            bundle
                .warnings
                .iter()
                .map(|warning| warning.to_diagnostic(Severity::Warning)),
        );

        if result.timed_out() || result.summary.starts_with("Execution terminated") {
            tracing::warn!(execution_id = %id, summary = %result.summary, "Execution terminated by watchdog");
        }
        tracing::info!(
            execution_id = %id,
            runtime = self.runtime.name(),
            summary = %result.summary,
            duration_ms = result.duration_ms,
            success = result.success,
            "Plan executed"
        );

        Ok(Outcome::Executed(result))
    }
}
