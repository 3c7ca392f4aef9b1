//! Markdown rendering of outcomes for tool transports

use crate::service::{BuildFailure, Outcome, SyntaxCheck};
use crate::types::ExecutionResult;
use scriptbox_common::Diagnostic;
use serde::Serialize;

/// One rendered tool response: markdown blocks plus the error flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub blocks: Vec<String>,
    pub is_error: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusMeta<'a> {
    summary: &'a str,
    success: bool,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "<[Diagnostic]>::is_empty")]
    diagnostics: &'a [Diagnostic],
}

impl ExecutionReport {
    pub fn from_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Executed(result) => Self::from_result(result),
            Outcome::BuildFailed(failure) => Self::from_build_failure(failure),
        }
    }

    /// `### Status`, then stdout and stderr blocks when they have content
    pub fn from_result(result: &ExecutionResult) -> Self {
        let meta = StatusMeta {
            summary: &result.summary,
            success: result.success,
            exit_code: result.exit_code,
            duration_ms: Some(result.duration_ms),
            diagnostics: &result.diagnostics,
        };

        let mut blocks = vec![format!("### Status\n{}", pretty_json(&meta))];
        if !result.stdout.trim().is_empty() {
            blocks.push(format!("### Standard Output\n```\n{}\n```", result.stdout));
        }
        if !result.stderr.trim().is_empty() {
            blocks.push(format!("### Standard Error\n```\n{}\n```", result.stderr));
        }

        Self {
            blocks,
            is_error: result.is_error(),
        }
    }

    pub fn from_build_failure(failure: &BuildFailure) -> Self {
        let meta = StatusMeta {
            summary: &failure.summary,
            success: false,
            exit_code: BuildFailure::EXIT_CODE,
            duration_ms: None,
            diagnostics: &failure.diagnostics,
        };

        Self {
            blocks: vec![format!("### Build Failure\n{}", pretty_json(&meta))],
            is_error: true,
        }
    }

    pub fn from_syntax_check(check: &SyntaxCheck) -> Self {
        let heading = if check.success {
            "### Syntax Check Passed"
        } else {
            "### Syntax Check Failed"
        };

        Self {
            blocks: vec![format!("{}\n{}", heading, pretty_json(check))],
            is_error: !check.success,
        }
    }

    /// All blocks joined by blank lines
    pub fn to_markdown(&self) -> String {
        self.blocks.join("\n\n")
    }
}

fn pretty_json<T: Serialize>(value: &T) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(json) => json,
        Err(e) => serde_json::json!({ "error": e.to_string() }).to_string(),
    }
}
