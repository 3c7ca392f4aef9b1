//! Source map v3 parsing and position resolution.
//!
//! Only the subset needed to point runtime errors back at original source:
//! the `mappings` table and the `sources` list. Names, `sourcesContent` and
//! index maps are ignored.

pub mod vlq;

use base64::Engine;
use serde::Deserialize;

pub use vlq::VlqError;

/// Path fragment of the temporary directory the bundler materializes files in.
pub const BUNDLE_DIR_FRAGMENT: &str = "/scriptbox_";

/// Prefix of the inline map comment appended by the bundler.
pub const INLINE_MAP_PREFIX: &str = "//# sourceMappingURL=data:application/json;base64,";

/// A malformed source map document.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("sourcemap: invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sourcemap: unsupported version {0}")]
    UnsupportedVersion(i64),

    #[error("sourcemap: VLQ decode error on line {line}: {source}")]
    Vlq { line: usize, source: VlqError },

    #[error("sourcemap: position overflow on line {line}")]
    PositionOverflow { line: usize },

    #[error("sourcemap: invalid inline base64: {0}")]
    InlineEncoding(#[from] base64::DecodeError),
}

/// One decoded mapping. All fields are zero-based and absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub generated_column: i32,
    pub source_index: i32,
    pub source_line: i32,
    pub source_column: i32,
}

/// Resolved location in an original source file. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Deserialize)]
struct RawSourceMap {
    version: i64,
    #[serde(default)]
    sources: Vec<Option<String>>,
    #[serde(default)]
    mappings: String,
}

/// Parsed source map, ready for lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMap {
    sources: Vec<String>,
    /// Indexed by zero-based generated line. A line without mappings is an
    /// empty vector; a line past the end does not exist.
    mappings: Vec<Vec<Segment>>,
}

impl SourceMap {
    /// Parse a v3 source map document.
    pub fn parse(document: impl AsRef<[u8]>) -> Result<Self, FormatError> {
        let raw: RawSourceMap = serde_json::from_slice(document.as_ref())?;
        if raw.version != 3 {
            return Err(FormatError::UnsupportedVersion(raw.version));
        }

        let sources = raw
            .sources
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();

        Ok(Self {
            sources,
            mappings: decode_mappings(&raw.mappings)?,
        })
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Number of generated lines the mapping string covers.
    pub fn line_count(&self) -> usize {
        self.mappings.len()
    }

    /// Segments of a zero-based generated line.
    pub fn segments(&self, line_index: usize) -> Option<&[Segment]> {
        self.mappings.get(line_index).map(Vec::as_slice)
    }

    /// Map a 1-based generated position to its original position.
    ///
    /// Picks the closest mapping at or before `generated_column` on the line.
    /// Returns `None` when the line is out of range or unmapped, when no
    /// mapping precedes the column, or when the mapping names an unknown
    /// source.
    pub fn resolve(&self, generated_line: u32, generated_column: u32) -> Option<OriginalPosition> {
        let line_index = usize::try_from(generated_line.checked_sub(1)?).ok()?;
        let column = i64::from(generated_column.saturating_sub(1));

        let mut best = None;
        for segment in self.mappings.get(line_index)? {
            if i64::from(segment.generated_column) > column {
                break;
            }
            best = Some(segment);
        }
        let best = best?;

        let source = self.sources.get(usize::try_from(best.source_index).ok()?)?;

        Some(OriginalPosition {
            source: normalize_source_name(source),
            line: u32::try_from(i64::from(best.source_line) + 1).ok()?,
            column: u32::try_from(i64::from(best.source_column) + 1).ok()?,
        })
    }
}

fn decode_mappings(mappings: &str) -> Result<Vec<Vec<Segment>>, FormatError> {
    let mut lines = Vec::new();

    // Carried across the whole document; only the generated column resets per line.
    let mut source_index = 0i32;
    let mut source_line = 0i32;
    let mut source_column = 0i32;

    for (line_index, line) in mappings.split(';').enumerate() {
        let mut segments = Vec::new();
        let mut generated_column = 0i32;
        let overflow = || FormatError::PositionOverflow {
            line: line_index + 1,
        };

        for raw in line.split(',').filter(|s| !s.is_empty()) {
            let fields = vlq::decode(raw).map_err(|source| FormatError::Vlq {
                line: line_index + 1,
                source,
            })?;

            generated_column = generated_column
                .checked_add(fields[0])
                .ok_or_else(overflow)?;
            if fields.len() < 4 {
                continue;
            }

            source_index = source_index.checked_add(fields[1]).ok_or_else(overflow)?;
            source_line = source_line.checked_add(fields[2]).ok_or_else(overflow)?;
            source_column = source_column.checked_add(fields[3]).ok_or_else(overflow)?;

            segments.push(Segment {
                generated_column,
                source_index,
                source_line,
                source_column,
            });
        }

        lines.push(segments);
    }

    Ok(lines)
}

/// Strip the bundler's temporary directory from a source path so only the
/// virtual project path remains.
pub fn normalize_source_name(source: &str) -> String {
    let unified = source.replace('\\', "/");

    if let Some(idx) = unified.rfind(BUNDLE_DIR_FRAGMENT) {
        let rest = &unified[idx + BUNDLE_DIR_FRAGMENT.len()..];
        return match rest.find('/') {
            Some(slash) => rest[slash + 1..].to_string(),
            None => rest.to_string(),
        };
    }

    if unified.contains("/tmp/") || source.contains("\\Temp\\") {
        if let Some(name) = unified.rsplit('/').next() {
            return name.to_string();
        }
    }

    source.to_string()
}

/// Split an inline source map comment off a bundle.
///
/// Returns the bundle without the comment, and the parsed map when a comment
/// was present. A broken map yields `Some(Err(..))`, never a failure of the
/// whole split.
pub fn extract_inline_source_map(js: &str) -> (String, Option<Result<SourceMap, FormatError>>) {
    let Some(idx) = js.rfind(INLINE_MAP_PREFIX) else {
        return (js.to_string(), None);
    };

    let clean = js[..idx].trim_end_matches(['\n', '\r', ' ']).to_string();
    let encoded = js[idx + INLINE_MAP_PREFIX.len()..].trim();

    let parsed = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(FormatError::from)
        .and_then(SourceMap::parse);

    (clean, Some(parsed))
}
