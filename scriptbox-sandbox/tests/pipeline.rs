//! End-to-end pipeline: validate, bundle, execute, report

mod common;

use assert_matches::assert_matches;
use common::{passthrough_service, setup_test_logging, test_limits};
use scriptbox_sandbox::common::{Severity, ValidationError, VirtualFile};
use scriptbox_sandbox::{
    Artifact, EsbuildBundler, ExecutionReport, InMemoryArtifactStore, Outcome, SandboxService,
    ServiceError, V8Runtime, EXIT_TIMEOUT,
};
use tokio_util::sync::CancellationToken;

fn esbuild_service() -> SandboxService {
    SandboxService::new(V8Runtime::with_limits(test_limits()), EsbuildBundler::new())
}

#[tokio::test]
async fn test_script_runs_through_passthrough() {
    setup_test_logging();
    let outcome = passthrough_service()
        .execute_script("console.log('hello from the sandbox')", 0)
        .await
        .unwrap();

    let result = outcome.execution().unwrap();
    assert!(result.success);
    assert_eq!(result.stdout, "hello from the sandbox\n");

    let report = ExecutionReport::from_outcome(&outcome);
    assert!(!report.is_error);
    assert!(report.to_markdown().contains("### Standard Output"));
}

#[tokio::test]
async fn test_invalid_plans_are_rejected_before_execution() {
    let service = passthrough_service();

    assert_matches!(
        service.execute_project(Vec::new(), "main.ts", 1000).await,
        Err(ServiceError::Validation(ValidationError::NoFiles))
    );
    assert_matches!(
        service
            .execute_project(vec![VirtualFile::new("../evil.ts", "")], "../evil.ts", 1000)
            .await,
        Err(ServiceError::Validation(
            ValidationError::InvalidFileName { .. }
        ))
    );
    assert_matches!(
        service
            .execute_project(
                vec![VirtualFile::new("lib/COM1.ts", "")],
                "lib/COM1.ts",
                1000
            )
            .await,
        Err(ServiceError::Validation(
            ValidationError::InvalidFileName { .. }
        ))
    );
}

#[tokio::test]
async fn test_timeout_through_pipeline() {
    let outcome = passthrough_service()
        .execute_script("while (true) {}", 100)
        .await
        .unwrap();
    let result = outcome.execution().unwrap();
    assert_eq!(result.exit_code, EXIT_TIMEOUT);

    let report = ExecutionReport::from_outcome(&outcome);
    assert!(report.is_error);
}

#[tokio::test]
async fn test_cancellation_reports_timeout() {
    let token = CancellationToken::new();
    token.cancel();
    let plan = scriptbox_sandbox::common::ExecutionPlan::single_file("main.js", "while (true) {}")
        .with_timeout_ms(30_000);

    let outcome = passthrough_service()
        .run_plan_with_cancellation(plan, token)
        .await
        .unwrap();
    assert_eq!(outcome.execution().unwrap().exit_code, EXIT_TIMEOUT);
}

#[tokio::test]
async fn test_artifact_execution() {
    let store = InMemoryArtifactStore::new();
    store.insert(
        "nightly",
        Artifact {
            filename: "nightly.js".into(),
            content: "console.log(6 * 7)".into(),
        },
    );
    let service = passthrough_service().with_artifact_store(store);

    let outcome = service.execute_artifact("nightly", 0).await.unwrap();
    assert_eq!(outcome.execution().unwrap().stdout, "42\n");
}

#[tokio::test]
#[ignore = "requires the esbuild binary on PATH"]
async fn test_typescript_project_with_esbuild() {
    setup_test_logging();
    let files = vec![
        VirtualFile::new(
            "lib/math.ts",
            "export function add(a: number, b: number): number {\n  return a + b;\n}\n",
        ),
        VirtualFile::new(
            "main.ts",
            "import { add } from './lib/math';\nconsole.log('sum', add(2, 3));\n",
        ),
    ];
    let outcome = esbuild_service()
        .execute_project(files, "main.ts", 5000)
        .await
        .unwrap();

    let result = outcome.execution().unwrap();
    assert!(result.success, "{:?}", result);
    assert_eq!(result.stdout, "sum 5\n");
}

#[tokio::test]
#[ignore = "requires the esbuild binary on PATH"]
async fn test_runtime_error_mapped_with_esbuild() {
    let code = "const value: number = 1;\nfunction fail(): never {\n    throw new Error('boom ' + value);\n}\nfail();\n";
    let outcome = esbuild_service()
        .execute_project(vec![VirtualFile::new("main.ts", code)], "main.ts", 5000)
        .await
        .unwrap();

    let result = outcome.execution().unwrap();
    assert_eq!(result.exit_code, 1);
    let diag = &result.diagnostics[0];
    assert_eq!(diag.source.as_deref(), Some("main.ts"));
    assert_eq!(diag.line, Some(3));
    assert_eq!(result.summary, "Runtime Error: Error: boom 1 in main.ts:3");
}

#[tokio::test]
#[ignore = "requires the esbuild binary on PATH"]
async fn test_build_failure_with_esbuild() {
    let outcome = esbuild_service()
        .execute_script("let a x = 1;", 1000)
        .await
        .unwrap();
    match &outcome {
        Outcome::BuildFailed(failure) => {
            assert!(failure.summary.starts_with("Build Error: "));
            assert!(failure.summary.ends_with(" in script.ts:1"));
            assert_eq!(failure.diagnostics[0].severity, Severity::Error);
        }
        other => panic!("expected build failure, got {:?}", other),
    }
    assert!(ExecutionReport::from_outcome(&outcome).blocks[0].starts_with("### Build Failure"));

    let check = esbuild_service().check_syntax("let x = (").await;
    assert!(!check.success);
    let check = esbuild_service().check_syntax("let x: number = 1;").await;
    assert!(check.success);
    assert_eq!(check.summary, "Syntax is valid");
}
