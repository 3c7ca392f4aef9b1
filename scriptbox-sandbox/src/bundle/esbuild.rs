//! Bundler backed by the external `esbuild` binary

use super::{BundleError, BundleMessage, BundleResult, Bundler};
use crate::sourcemap::{extract_inline_source_map, normalize_source_name};
use async_trait::async_trait;
use scriptbox_common::ExecutionPlan;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Prefix of the per-bundle working directory; source names are normalized against it
pub const TEMP_DIR_PREFIX: &str = "scriptbox_";

const ESBUILD_FLAGS: &[&str] = &[
    "--bundle",
    "--platform=node",
    "--target=es2020",
    "--format=iife",
    "--global-name=__entry__",
    "--sourcemap=inline",
    "--sources-content=false",
    "--log-level=warning",
    "--color=false",
];

/// Materializes the plan in a temporary directory and runs `esbuild` on it
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    binary: PathBuf,
}

impl EsbuildBundler {
    /// Use `esbuild` from `PATH`
    pub fn new() -> Self {
        Self::with_binary("esbuild")
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Default for EsbuildBundler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bundler for EsbuildBundler {
    async fn bundle(&self, plan: &ExecutionPlan) -> Result<BundleResult, BundleError> {
        // Removed on drop, whatever the outcome
        let workdir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir()?;

        for file in &plan.files {
            let dest = workdir.path().join(&file.name);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&dest, &file.content).await?;
        }

        tracing::debug!(
            binary = %self.binary.display(),
            workdir = %workdir.path().display(),
            entry = %plan.entry_point,
            files = plan.files.len(),
            "Invoking esbuild"
        );

        let output = Command::new(&self.binary)
            .current_dir(workdir.path())
            .arg(format!("./{}", plan.entry_point))
            .args(ESBUILD_FLAGS)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                BundleError::Internal(format!(
                    "failed to run {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let log = parse_log(&stderr, workdir.path());

        if !log.errors.is_empty() {
            return Err(BundleError::Compile(log.errors));
        }
        if !output.status.success() {
            return Err(BundleError::Internal(format!(
                "esbuild exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        if raw.trim().is_empty() {
            return Err(BundleError::Compile(vec![BundleMessage::new(
                "esbuild produced no output",
            )]));
        }

        let (code, parsed) = extract_inline_source_map(&raw);
        let source_map = match parsed {
            Some(Ok(map)) => Some(map),
            Some(Err(err)) => {
                tracing::debug!(error = %err, "Discarding unreadable source map");
                None
            }
            None => None,
        };

        Ok(BundleResult {
            code,
            source_map,
            warnings: log.warnings,
        })
    }

    fn name(&self) -> &str {
        "esbuild"
    }
}

#[derive(Debug, Default, PartialEq)]
struct EsbuildLog {
    errors: Vec<BundleMessage>,
    warnings: Vec<BundleMessage>,
}

impl EsbuildLog {
    fn push(&mut self, entry: Option<(Level, BundleMessage)>) {
        match entry {
            Some((Level::Error, message)) => self.errors.push(message),
            Some((Level::Warning, message)) => self.warnings.push(message),
            None => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Level {
    Error,
    Warning,
}

/// Parse esbuild's human-readable log.
///
/// Each message starts with a `[ERROR]`/`[WARNING]` header; the first
/// `file:line:column:` line after it is the message location. esbuild
/// reports 0-based columns.
fn parse_log(stderr: &str, workdir: &Path) -> EsbuildLog {
    let mut log = EsbuildLog::default();
    let mut current: Option<(Level, BundleMessage)> = None;

    for line in stderr.lines() {
        if let Some((level, text)) = message_header(line) {
            log.push(current.take());
            current = Some((level, BundleMessage::new(text)));
            continue;
        }

        if let Some((_, message)) = current.as_mut() {
            if message.source.is_none() {
                if let Some((file, line, column)) = location_line(line) {
                    *message = message
                        .clone()
                        .at(relative_source(file, workdir), line, column + 1);
                }
            }
        }
    }
    log.push(current.take());

    log
}

fn message_header(line: &str) -> Option<(Level, &str)> {
    let line = line.trim_start();
    if let Some(idx) = line.find("[ERROR] ") {
        return Some((Level::Error, line[idx + "[ERROR] ".len()..].trim()));
    }
    if let Some(idx) = line.find("[WARNING] ") {
        return Some((Level::Warning, line[idx + "[WARNING] ".len()..].trim()));
    }
    None
}

/// `    main.ts:1:6:` → `("main.ts", 1, 6)`
fn location_line(line: &str) -> Option<(&str, u32, u32)> {
    let trimmed = line.trim().strip_suffix(':')?;
    let mut fields = trimmed.rsplitn(3, ':');
    let column = fields.next()?.parse().ok()?;
    let line = fields.next()?.parse().ok()?;
    let file = fields.next().filter(|f| !f.is_empty() && !f.contains(' '))?;
    Some((file, line, column))
}

fn relative_source(file: &str, workdir: &Path) -> String {
    let file = file.strip_prefix("./").unwrap_or(file);
    match Path::new(file).strip_prefix(workdir) {
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => normalize_source_name(file),
    }
}
