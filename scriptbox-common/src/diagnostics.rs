use serde::{Deserialize, Serialize};

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// An error or warning, positioned in original source terms when possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Original file, e.g. `main.ts`, or `<bundle>` when unresolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// 1-based line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,

    /// Position in the generated bundle, kept for resolution and logging only.
    #[serde(skip)]
    pub generated_line: Option<u32>,
    #[serde(skip)]
    pub generated_column: Option<u32>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            source: None,
            line: None,
            column: None,
            generated_line: None,
            generated_column: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Attach an original-source position.
    pub fn at(mut self, source: impl Into<String>, line: u32, column: u32) -> Self {
        self.source = Some(source.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Record where in the bundle the diagnostic was raised.
    pub fn generated_at(mut self, line: u32, column: u32) -> Self {
        self.generated_line = Some(line);
        self.generated_column = Some(column);
        self
    }

    /// `source:line` for summaries; empty parts render as in `" in :0"`.
    pub fn location_label(&self) -> String {
        format!(
            "{}:{}",
            self.source.as_deref().unwrap_or(""),
            self.line.unwrap_or(0)
        )
    }
}
