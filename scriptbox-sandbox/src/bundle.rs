//! Bundler contract
//!
//! A bundler turns a validated [`ExecutionPlan`] into one executable script,
//! plus an optional source map back into the plan's files. Compile errors are
//! reported in original-source terms.

mod esbuild;

pub use esbuild::EsbuildBundler;

use crate::sourcemap::SourceMap;
use async_trait::async_trait;
use scriptbox_common::{Diagnostic, ExecutionPlan, Severity};
use std::fmt;

/// Output of a successful bundle
#[derive(Debug, Clone)]
pub struct BundleResult {
    /// Executable JavaScript, with any inline source map comment removed
    pub code: String,
    /// Map from `code` back to the plan's files, if one could be produced
    pub source_map: Option<SourceMap>,
    pub warnings: Vec<BundleMessage>,
}

/// One bundler diagnostic, positioned in original source terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleMessage {
    pub text: String,
    /// Project-relative file name, e.g. `main.ts`
    pub source: Option<String>,
    /// 1-based
    pub line: Option<u32>,
    /// 1-based
    pub column: Option<u32>,
}

impl BundleMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
            line: None,
            column: None,
        }
    }

    pub fn at(mut self, source: impl Into<String>, line: u32, column: u32) -> Self {
        self.source = Some(source.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn to_diagnostic(&self, severity: Severity) -> Diagnostic {
        let diagnostic = Diagnostic::new(severity, self.text.clone());
        match (&self.source, self.line, self.column) {
            (Some(source), Some(line), column) => {
                diagnostic.at(source.clone(), line, column.unwrap_or(1))
            }
            _ => diagnostic,
        }
    }
}

impl fmt::Display for BundleMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, self.line) {
            (Some(source), Some(line)) if line > 0 => write!(
                f,
                "{}:{}:{}: {}",
                source,
                line,
                self.column.unwrap_or(1),
                self.text
            ),
            _ => write!(f, "bundle failed: {}", self.text),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// The plan does not compile
    #[error("{}", describe_compile(.0))]
    Compile(Vec<BundleMessage>),

    /// The bundler itself failed
    #[error("bundler failed: {0}")]
    Internal(String),

    #[error("bundler I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_compile(messages: &[BundleMessage]) -> String {
    match messages.first() {
        Some(first) => first.to_string(),
        None => "bundle failed".to_string(),
    }
}

/// Trait for turning a plan into a single executable script
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn bundle(&self, plan: &ExecutionPlan) -> Result<BundleResult, BundleError>;

    /// Get bundler name
    fn name(&self) -> &str;
}

/// Emits the entry file verbatim, without a source map.
///
/// Only suitable for single-file plain JavaScript; imports and type
/// annotations are left for the engine to reject.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughBundler;

#[async_trait]
impl Bundler for PassthroughBundler {
    async fn bundle(&self, plan: &ExecutionPlan) -> Result<BundleResult, BundleError> {
        let entry = plan.entry_file().ok_or_else(|| {
            BundleError::Compile(vec![BundleMessage::new(format!(
                "Could not resolve {:?}",
                plan.entry_point
            ))])
        })?;

        Ok(BundleResult {
            code: entry.content.clone(),
            source_map: None,
            warnings: Vec::new(),
        })
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}
