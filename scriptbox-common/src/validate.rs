//! Structural and security checks applied to a plan before any compute is spent.

use crate::plan::{ExecutionPlan, MAX_TIMEOUT_MS, MIN_TIMEOUT_MS};

/// Device names Windows reserves regardless of extension.
const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Why a plan was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no files: at least one file required")]
    NoFiles,

    #[error("entry point must not be empty")]
    EmptyEntryPoint,

    #[error("entry point {0:?} not found in provided files")]
    EntryPointNotFound(String),

    #[error("invalid file name {name:?}: {rule}")]
    InvalidFileName { name: String, rule: FileNameRule },
}

/// The filename-safety rule a name violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileNameRule {
    Empty,
    Absolute,
    ParentTraversal,
    InvalidCharacter(char),
    ConsecutiveSlashes,
    LeadingDotSlash,
    TrailingSlash,
    TrailingDot,
    ReservedDeviceName,
}

impl std::fmt::Display for FileNameRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileNameRule::Empty => write!(f, "file name must not be empty"),
            FileNameRule::Absolute => write!(f, "file name must not be absolute"),
            FileNameRule::ParentTraversal => write!(f, "file name must not contain '..'"),
            FileNameRule::InvalidCharacter(c) => {
                write!(f, "character {:?} is not allowed (use [A-Za-z0-9._/-])", c)
            }
            FileNameRule::ConsecutiveSlashes => {
                write!(f, "file name must not contain consecutive slashes")
            }
            FileNameRule::LeadingDotSlash => write!(f, "file name must not start with './'"),
            FileNameRule::TrailingSlash => write!(f, "file name must not end with '/'"),
            FileNameRule::TrailingDot => write!(f, "file name must not end with '.'"),
            FileNameRule::ReservedDeviceName => {
                write!(f, "path segment is a reserved device name")
            }
        }
    }
}

/// Validate a plan in place.
///
/// Checks run in a fixed order and the first failure is returned. The timeout
/// is clamped rather than rejected, so a successful call may have modified
/// `plan.timeout_ms`.
pub fn validate_plan(plan: &mut ExecutionPlan) -> Result<(), ValidationError> {
    if plan.files.is_empty() {
        return Err(ValidationError::NoFiles);
    }

    if plan.entry_point.is_empty() {
        return Err(ValidationError::EmptyEntryPoint);
    }

    for file in &plan.files {
        validate_file_name(&file.name).map_err(|rule| ValidationError::InvalidFileName {
            name: file.name.clone(),
            rule,
        })?;
    }

    if !plan.files.iter().any(|f| f.name == plan.entry_point) {
        return Err(ValidationError::EntryPointNotFound(plan.entry_point.clone()));
    }

    plan.timeout_ms = clamp_timeout(plan.timeout_ms);
    Ok(())
}

/// Clamp a timeout into the supported range. Idempotent.
pub fn clamp_timeout(timeout_ms: u64) -> u64 {
    timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS)
}

/// Check a virtual file name against the filename-safety rule.
pub fn validate_file_name(name: &str) -> Result<(), FileNameRule> {
    if name.is_empty() {
        return Err(FileNameRule::Empty);
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(FileNameRule::Absolute);
    }
    if name.contains("..") {
        return Err(FileNameRule::ParentTraversal);
    }
    if let Some(c) = name.chars().find(|c| !is_allowed_char(*c)) {
        return Err(FileNameRule::InvalidCharacter(c));
    }
    if name.contains("//") {
        return Err(FileNameRule::ConsecutiveSlashes);
    }
    if name.starts_with("./") {
        return Err(FileNameRule::LeadingDotSlash);
    }
    if name.ends_with('/') {
        return Err(FileNameRule::TrailingSlash);
    }
    if name.ends_with('.') {
        return Err(FileNameRule::TrailingDot);
    }
    if name.split('/').any(is_reserved_segment) {
        return Err(FileNameRule::ReservedDeviceName);
    }
    Ok(())
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-')
}

fn is_reserved_segment(segment: &str) -> bool {
    let stem = segment.split('.').next().unwrap_or(segment);
    let upper = stem.to_ascii_uppercase();
    RESERVED_DEVICE_NAMES.contains(&upper.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::VirtualFile;

    const MAIN_TS: &str = "main.ts";

    #[test]
    fn test_validate_plan_success() {
        let mut plan = ExecutionPlan::new(
            vec![
                VirtualFile::new("a.ts", "export const a = 1;"),
                VirtualFile::new(MAIN_TS, "import { a } from './a'; console.log(a);"),
            ],
            MAIN_TS,
        )
        .with_timeout_ms(5000);

        assert_eq!(validate_plan(&mut plan), Ok(()));
        assert_eq!(plan.timeout_ms, 5000);
    }

    #[test]
    fn test_validate_plan_empty_files() {
        let mut plan = ExecutionPlan::new(Vec::new(), MAIN_TS);
        let err = validate_plan(&mut plan).unwrap_err();
        assert_eq!(err, ValidationError::NoFiles);
        assert!(err.to_string().contains("no files"));
    }

    #[test]
    fn test_validate_plan_empty_entry_point() {
        let mut plan = ExecutionPlan::new(vec![VirtualFile::new("a.ts", "1")], "");
        assert_eq!(
            validate_plan(&mut plan),
            Err(ValidationError::EmptyEntryPoint)
        );
    }

    #[test]
    fn test_validate_plan_missing_entry_point() {
        let mut plan = ExecutionPlan::new(vec![VirtualFile::new("a.ts", "1")], "missing.ts");
        let err = validate_plan(&mut plan).unwrap_err();
        assert!(err.to_string().contains("missing.ts"));
    }

    #[test]
    fn test_bad_file_name_reported_before_missing_entry() {
        let mut plan = ExecutionPlan::new(vec![VirtualFile::new("../x.ts", "1")], "main.ts");
        let err = validate_plan(&mut plan).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidFileName {
                rule: FileNameRule::ParentTraversal,
                ..
            }
        ));
        assert!(err.to_string().contains(".."));
    }

    #[test]
    fn test_timeout_clamped_not_rejected() {
        let mut low = ExecutionPlan::single_file(MAIN_TS, "").with_timeout_ms(0);
        validate_plan(&mut low).unwrap();
        assert_eq!(low.timeout_ms, MIN_TIMEOUT_MS);

        let mut high = ExecutionPlan::single_file(MAIN_TS, "").with_timeout_ms(999_999);
        validate_plan(&mut high).unwrap();
        assert_eq!(high.timeout_ms, MAX_TIMEOUT_MS);
    }

    #[test]
    fn test_clamp_is_idempotent() {
        for ms in [0, 1, 99, 100, 101, 5_000, 30_000, 30_001, 999_999, u64::MAX] {
            let once = clamp_timeout(ms);
            assert_eq!(clamp_timeout(once), once, "clamp({ms}) not idempotent");
            assert!((MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&once));
        }
    }

    #[test]
    fn test_validate_file_name() {
        let cases = [
            ("main.ts", None),
            ("src/utils.ts", None),
            ("_hidden.js", None),
            ("my-file_123.test.ts", None),
            ("a/b/c/d.js", None),
            ("console.ts", None),
            ("", Some(FileNameRule::Empty)),
            ("/abs/path.ts", Some(FileNameRule::Absolute)),
            ("\\win\\path.ts", Some(FileNameRule::Absolute)),
            ("../traversal.ts", Some(FileNameRule::ParentTraversal)),
            ("src/../traversal.ts", Some(FileNameRule::ParentTraversal)),
            ("./start.ts", Some(FileNameRule::LeadingDotSlash)),
            ("end/", Some(FileNameRule::TrailingSlash)),
            ("dots.", Some(FileNameRule::TrailingDot)),
            ("space in name.ts", Some(FileNameRule::InvalidCharacter(' '))),
            ("special!@#.ts", Some(FileNameRule::InvalidCharacter('!'))),
            ("double//slash.ts", Some(FileNameRule::ConsecutiveSlashes)),
            ("nul", Some(FileNameRule::ReservedDeviceName)),
            ("aux.ts", Some(FileNameRule::ReservedDeviceName)),
            ("com1/file.ts", Some(FileNameRule::ReservedDeviceName)),
            ("src/Lpt3.d.ts", Some(FileNameRule::ReservedDeviceName)),
            ("CON.js", Some(FileNameRule::ReservedDeviceName)),
            ("LPT9", Some(FileNameRule::ReservedDeviceName)),
        ];

        for (name, expected) in cases {
            assert_eq!(
                validate_file_name(name).err(),
                expected,
                "validate_file_name({name:?})"
            );
        }
    }

    #[test]
    fn test_com_and_lpt_outside_range_are_allowed() {
        assert!(validate_file_name("com10.ts").is_ok());
        assert!(validate_file_name("lpt0/x.ts").is_ok());
        assert!(validate_file_name("connect.ts").is_ok());
    }
}
