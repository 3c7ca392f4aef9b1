use serde::{Deserialize, Serialize};

/// Lower bound applied to a plan's timeout.
pub const MIN_TIMEOUT_MS: u64 = 100;
/// Upper bound applied to a plan's timeout.
pub const MAX_TIMEOUT_MS: u64 = 30_000;
/// Timeout used when the caller leaves `timeout_ms` unset (zero).
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// A single source file of a virtual project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VirtualFile {
    /// Path-like name, relative to the virtual project root (e.g. `src/util.ts`).
    pub name: String,
    /// Full text of the file.
    pub content: String,
}

impl VirtualFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Unit of work: the files to bundle, where to start, and how long to run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// Source files, in the order the caller supplied them.
    #[serde(default)]
    pub files: Vec<VirtualFile>,
    /// Name of the file execution starts from.
    #[serde(default)]
    pub entry_point: String,
    /// Wall-clock budget in milliseconds, clamped during validation.
    #[serde(default)]
    pub timeout_ms: u64,
}

impl ExecutionPlan {
    /// Plan with a single file that is also the entry point.
    pub fn single_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            files: vec![VirtualFile::new(name.clone(), content)],
            entry_point: name,
            timeout_ms: 0,
        }
    }

    /// Plan over an explicit file set.
    pub fn new(files: Vec<VirtualFile>, entry_point: impl Into<String>) -> Self {
        Self {
            files,
            entry_point: entry_point.into(),
            timeout_ms: 0,
        }
    }

    /// Set the timeout in milliseconds
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Fill in the default timeout when the caller left it unset.
    pub fn apply_default_timeout(&mut self, default_ms: u64) {
        if self.timeout_ms == 0 {
            self.timeout_ms = default_ms;
        }
    }

    /// Look up a file by name.
    pub fn file(&self, name: &str) -> Option<&VirtualFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// The entry point file, if it is part of the plan.
    pub fn entry_file(&self) -> Option<&VirtualFile> {
        self.file(&self.entry_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_serializes_camel_case() {
        let plan = ExecutionPlan::single_file("main.ts", "console.log(1)").with_timeout_ms(500);
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["entryPoint"], "main.ts");
        assert_eq!(json["timeoutMs"], 500);
        assert_eq!(json["files"][0]["name"], "main.ts");
    }

    #[test]
    fn test_plan_deserializes_with_missing_timeout() {
        let plan: ExecutionPlan = serde_json::from_str(
            r#"{"files":[{"name":"a.ts","content":"1"}],"entryPoint":"a.ts"}"#,
        )
        .unwrap();
        assert_eq!(plan.timeout_ms, 0);
        assert_eq!(plan.entry_file().map(|f| f.content.as_str()), Some("1"));
    }

    #[test]
    fn test_default_timeout_only_fills_unset() {
        let mut unset = ExecutionPlan::single_file("a.ts", "");
        unset.apply_default_timeout(DEFAULT_TIMEOUT_MS);
        assert_eq!(unset.timeout_ms, DEFAULT_TIMEOUT_MS);

        let mut set = ExecutionPlan::single_file("a.ts", "").with_timeout_ms(250);
        set.apply_default_timeout(DEFAULT_TIMEOUT_MS);
        assert_eq!(set.timeout_ms, 250);
    }
}
