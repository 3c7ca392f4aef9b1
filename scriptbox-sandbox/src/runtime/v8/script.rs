//! Compiling and running the entry script under a `TryCatch`
//!
//! Running the script here rather than through `JsRuntime::execute_script`
//! keeps the caller's entry name as the script resource name and gives access
//! to the V8 `Message` of whatever was thrown. deno_core only records stack
//! frames for `Error` objects, so a bare `throw "x"` would otherwise lose its
//! position.

use super::outcome::{ScriptError, ScriptOutcome};
use deno_core::error::JsError;
use deno_core::{v8, JsRuntime};

/// Run `code` as a classic script named `entry_name`.
pub(crate) fn run_entry(runtime: &mut JsRuntime, entry_name: &str, code: &str) -> ScriptOutcome {
    let scope = &mut runtime.handle_scope();

    let (Some(source), Some(resource_name)) = (
        v8::String::new(scope, code),
        v8::String::new(scope, entry_name),
    ) else {
        return Err(ScriptError::thrown(
            "Error: script source could not be allocated",
            None,
        ));
    };
    let origin = v8::ScriptOrigin::new(
        scope,
        resource_name.into(),
        0,
        0,
        false,
        0,
        None,
        false,
        false,
        false,
        None,
    );

    let tc = &mut v8::TryCatch::new(scope);
    let completed = v8::Script::compile(tc, source, Some(&origin))
        .and_then(|script| script.run(tc))
        .is_some();
    if completed {
        return Ok(());
    }

    if tc.has_terminated() || tc.is_execution_terminating() {
        return Err(ScriptError::terminated());
    }

    let Some(exception) = tc.exception() else {
        return Err(ScriptError::thrown(
            "Error: script failed without an exception",
            None,
        ));
    };
    let message_location = tc.message().and_then(|message| {
        let line = message.get_line_number(tc)?;
        let column = message.get_start_column() + 1;
        let file = message
            .get_script_resource_name(tc)
            .map(|name| name.to_rust_string_lossy(tc))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| entry_name.to_string());
        Some(format!("{}:{}:{}", file, line, column))
    });

    let js = JsError::from_v8_exception(tc, exception);
    let mut error = ScriptError::from_js(&js, entry_name);
    if error.location.is_none() {
        error.location = message_location;
    }
    Err(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deno_core::RuntimeOptions;

    fn run(code: &str) -> ScriptOutcome {
        let mut runtime = JsRuntime::new(RuntimeOptions::default());
        run_entry(&mut runtime, "main.js", code)
    }

    #[test]
    fn test_completed_script() {
        assert_eq!(run("const a = 1 + 1;"), Ok(()));
    }

    #[test]
    fn test_error_object_located_by_frame() {
        let error = run("\nthrow new Error('boom');").unwrap_err();
        assert_eq!(error.message, "Error: boom");
        assert_eq!(error.location.as_deref(), Some("main.js:2:7"));
        assert!(!error.terminated);
    }

    #[test]
    fn test_thrown_string_located_by_message() {
        let error = run("\n\nthrow 'x';").unwrap_err();
        assert_eq!(error.message, "x");
        let location = error.location.unwrap();
        assert!(location.starts_with("main.js:3:"), "{}", location);
    }

    #[test]
    fn test_syntax_error_located() {
        let error = run("let a x = 1;").unwrap_err();
        assert!(
            error.message.starts_with("SyntaxError"),
            "{}",
            error.message
        );
        assert!(error.location.unwrap().starts_with("main.js:1:"));
    }
}
