//! Turning an isolate run into an [`ExecutionResult`]

use super::host::ConsoleCapture;
use super::watchdog::Verdict;
use crate::sourcemap::SourceMap;
use crate::types::{ExecutionResult, EXIT_TIMEOUT};
use deno_core::error::JsError;
use scriptbox_common::Diagnostic;

/// Source name used when a position cannot be mapped back to the project
pub const BUNDLE_SOURCE: &str = "<bundle>";

/// Typed envelope for what came back across the isolate boundary
pub(crate) type ScriptOutcome = Result<(), ScriptError>;

/// An uncaught exception raised by the script, or a forced termination
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScriptError {
    pub message: String,
    /// `file:line:column` of the throw site in the bundle
    pub location: Option<String>,
    /// Execution was terminated by the host rather than by a throw
    pub terminated: bool,
}

impl ScriptError {
    pub fn thrown(message: impl Into<String>, location: Option<String>) -> Self {
        Self {
            message: message.into(),
            location,
            terminated: false,
        }
    }

    pub fn terminated() -> Self {
        Self {
            message: "execution terminated".to_string(),
            location: None,
            terminated: true,
        }
    }

    pub fn from_js(js: &JsError, entry_name: &str) -> Self {
        let message = match (js.name.as_deref(), js.message.as_deref()) {
            (Some(name), Some(message)) if !name.is_empty() => format!("{}: {}", name, message),
            (_, Some(message)) => message.to_string(),
            _ => js
                .exception_message
                .trim_start_matches("Uncaught ")
                .to_string(),
        };

        // Prefer the innermost frame inside the script over host bootstrap frames.
        let located = js
            .frames
            .iter()
            .filter(|frame| frame.file_name.is_some() && frame.line_number.is_some());
        let frame = located
            .clone()
            .find(|frame| frame.file_name.as_deref() == Some(entry_name))
            .or_else(|| located.clone().next());

        let location = frame.map(|frame| {
            format!(
                "{}:{}:{}",
                frame.file_name.as_deref().unwrap_or_default(),
                frame.line_number.unwrap_or(1),
                frame.column_number.unwrap_or(1)
            )
        });

        Self::thrown(message, location)
    }
}

/// Parse the trailing `line:column` out of a `file:line:column` string.
///
/// File names may themselves contain colons, so only the last two fields are
/// read. Anything that does not have that shape maps to `(1, 1)`.
pub fn parse_location(location: &str) -> (u32, u32) {
    let mut fields = location.rsplit(':');
    let column = fields.next().and_then(|c| c.trim().parse().ok());
    let line = fields.next().and_then(|l| l.trim().parse().ok());
    let has_file = fields.next().is_some();

    match (has_file, line, column) {
        (true, Some(line), Some(column)) => (line, column),
        _ => (1, 1),
    }
}

/// Build the diagnostic for a script error, resolving through the map when possible.
pub(crate) fn script_diagnostic(error: &ScriptError, source_map: Option<&SourceMap>) -> Diagnostic {
    let diagnostic = Diagnostic::error(error.message.clone());
    if error.terminated {
        return diagnostic;
    }

    let (line, column) = parse_location(error.location.as_deref().unwrap_or_default());
    let diagnostic = diagnostic.generated_at(line, column);

    match source_map.and_then(|map| map.resolve(line, column)) {
        Some(original) => diagnostic.at(original.source, original.line, original.column),
        None => diagnostic.at(BUNDLE_SOURCE, line, column),
    }
}

/// Everything observed about one isolate run
pub(crate) struct IsolateRun {
    pub outcome: ScriptOutcome,
    pub verdict: Option<Verdict>,
    pub deadline_passed: bool,
    pub heap_used_bytes: usize,
    pub console: ConsoleCapture,
    pub duration_ms: u64,
}

/// Classify a finished run.
///
/// Order matters: a deadline hit wins over everything else, then forced
/// termination (split into memory ceiling and other), then ordinary script
/// errors.
pub(crate) fn classify(
    run: IsolateRun,
    source_map: Option<&SourceMap>,
    memory_ceiling: Option<usize>,
) -> ExecutionResult {
    let IsolateRun {
        outcome,
        verdict,
        deadline_passed,
        heap_used_bytes,
        console,
        duration_ms,
    } = run;

    let mut result = ExecutionResult {
        stdout: console.stdout,
        stderr: console.stderr,
        exit_code: 0,
        success: true,
        duration_ms,
        summary: "Execution finished successfully".to_string(),
        diagnostics: Vec::new(),
    };

    let error = match outcome {
        Ok(()) => return result,
        Err(error) => error,
    };
    result.success = false;

    if deadline_passed || verdict.is_some_and(Verdict::is_timeout) {
        result
            .stderr
            .push_str("execution terminated: timeout exceeded\n");
        result.exit_code = EXIT_TIMEOUT;
        result.summary = "Execution timed out".to_string();
        return result;
    }

    let diagnostic = script_diagnostic(&error, source_map);
    result.exit_code = 1;

    if verdict.is_some() || error.terminated {
        let ceiling_bytes = match verdict {
            Some(Verdict::MemoryCeiling { heap_bytes }) => Some(heap_bytes.max(heap_used_bytes)),
            _ => memory_ceiling
                .filter(|&ceiling| heap_used_bytes > ceiling)
                .map(|_| heap_used_bytes),
        };
        match ceiling_bytes {
            Some(bytes) => {
                result.stderr.push_str(&format!(
                    "execution terminated: memory limit exceeded ({} MB)\n",
                    bytes / 1024 / 1024
                ));
                result.summary = "Execution terminated: Memory limit exceeded".to_string();
            }
            None => {
                result.summary = "Execution terminated (internal error or forced stop)".to_string();
            }
        }
    } else {
        result.summary = format!(
            "Runtime Error: {} in {}",
            diagnostic.message,
            diagnostic.location_label()
        );
    }

    result.diagnostics.push(diagnostic);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> SourceMap {
        // Generated line 1 maps column 0 to main.ts 1:1 and column 10 to main.ts 3:5.
        SourceMap::parse(
            r#"{"version":3,"sources":["../../tmp/scriptbox_abc/main.ts"],"mappings":"AAAA,UAEI"}"#,
        )
        .unwrap()
    }

    fn run(outcome: ScriptOutcome) -> IsolateRun {
        IsolateRun {
            outcome,
            verdict: None,
            deadline_passed: false,
            heap_used_bytes: 1024,
            console: ConsoleCapture {
                stdout: "out\n".into(),
                stderr: String::new(),
            },
            duration_ms: 7,
        }
    }

    fn thrown(message: &str, location: Option<&str>) -> ScriptError {
        ScriptError::thrown(message, location.map(str::to_string))
    }

    #[test]
    fn test_parse_location() {
        assert_eq!(parse_location("main.ts:3:5"), (3, 5));
        assert_eq!(parse_location("C:/work/main.js:12:40"), (12, 40));
        assert_eq!(parse_location("main.ts"), (1, 1));
        assert_eq!(parse_location("3:5"), (1, 1));
        assert_eq!(parse_location("main.ts:x:5"), (1, 1));
        assert_eq!(parse_location(""), (1, 1));
    }

    #[test]
    fn test_success() {
        let result = classify(run(Ok(())), None, None);
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.summary, "Execution finished successfully");
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_error_resolved_through_map() {
        let map = map();
        let error = thrown("Error: boom", Some("main.ts:1:11"));
        let result = classify(run(Err(error)), Some(&map), None);

        assert!(!result.success);
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.summary, "Runtime Error: Error: boom in main.ts:3");
        let diag = &result.diagnostics[0];
        assert_eq!(diag.source.as_deref(), Some("main.ts"));
        assert_eq!((diag.line, diag.column), (Some(3), Some(5)));
        assert_eq!(
            (diag.generated_line, diag.generated_column),
            (Some(1), Some(11))
        );
    }

    #[test]
    fn test_unmapped_error_points_into_bundle() {
        let error = thrown("TypeError: x is not a function", Some("main.ts:4:2"));
        let result = classify(run(Err(error)), None, None);
        assert_eq!(
            result.summary,
            "Runtime Error: TypeError: x is not a function in <bundle>:4"
        );
        assert_eq!(result.diagnostics[0].column, Some(2));
    }

    #[test]
    fn test_error_without_location_defaults_to_bundle_start() {
        let result = classify(run(Err(thrown("SyntaxError: bad", None))), None, None);
        assert_eq!(
            result.summary,
            "Runtime Error: SyntaxError: bad in <bundle>:1"
        );
        let diag = &result.diagnostics[0];
        assert_eq!(diag.source.as_deref(), Some(BUNDLE_SOURCE));
        assert_eq!((diag.line, diag.column), (Some(1), Some(1)));
    }

    #[test]
    fn test_script_message_about_termination_is_a_runtime_error() {
        let error = thrown("Error: Execution terminated early", Some("main.ts:2:7"));
        let result = classify(run(Err(error)), None, Some(1024));
        assert_eq!(
            result.summary,
            "Runtime Error: Error: Execution terminated early in <bundle>:2"
        );
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn test_timeout_wins() {
        let mut run = run(Err(ScriptError::terminated()));
        run.verdict = Some(Verdict::Deadline);
        let result = classify(run, None, Some(1024));

        assert_eq!(result.exit_code, EXIT_TIMEOUT);
        assert_eq!(result.summary, "Execution timed out");
        assert!(result
            .stderr
            .ends_with("execution terminated: timeout exceeded\n"));
        assert!(result.diagnostics.is_empty());
        assert!(result.timed_out());
    }

    #[test]
    fn test_deadline_passed_without_verdict() {
        let mut run = run(Err(thrown("Error: late", None)));
        run.deadline_passed = true;
        assert_eq!(classify(run, None, None).exit_code, EXIT_TIMEOUT);
    }

    #[test]
    fn test_memory_ceiling() {
        let mut run = run(Err(ScriptError::terminated()));
        run.verdict = Some(Verdict::MemoryCeiling {
            heap_bytes: 64 * 1024 * 1024,
        });
        let result = classify(run, None, Some(64 * 1024 * 1024));

        assert_eq!(result.exit_code, 1);
        assert_eq!(
            result.summary,
            "Execution terminated: Memory limit exceeded"
        );
        assert!(result
            .stderr
            .contains("execution terminated: memory limit exceeded (64 MB)"));
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn test_termination_over_ceiling_from_heap_stats() {
        let mut run = run(Err(ScriptError::terminated()));
        run.heap_used_bytes = 3 * 1024 * 1024;
        let result = classify(run, None, Some(2 * 1024 * 1024));
        assert_eq!(
            result.summary,
            "Execution terminated: Memory limit exceeded"
        );
    }

    #[test]
    fn test_forced_stop() {
        let result = classify(
            run(Err(ScriptError::terminated())),
            None,
            Some(128 * 1024 * 1024),
        );
        assert_eq!(
            result.summary,
            "Execution terminated (internal error or forced stop)"
        );
        assert_eq!(result.exit_code, 1);
    }
}
