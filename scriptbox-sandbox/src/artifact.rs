//! Artifact lookup contract
//!
//! Artifacts are previously stored scripts that can be executed by id. The
//! service only ever reads them.

use async_trait::async_trait;
use scriptbox_common::{validate_file_name, FileNameRule};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// A stored script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Used as both file name and entry point when the artifact is executed
    pub filename: String,
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact {0:?} not found")]
    NotFound(String),

    #[error("invalid artifact id {id:?}: {rule}")]
    InvalidId { id: String, rule: FileNameRule },

    #[error("artifact storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for artifact backends
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn read(&self, id: &str) -> Result<Artifact, ArtifactError>;
}

/// Artifacts held in process memory, keyed by id
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: RwLock<HashMap<String, Artifact>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an artifact, replacing any previous one with the same id
    pub fn insert(&self, id: impl Into<String>, artifact: Artifact) {
        let mut artifacts = match self.artifacts.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        artifacts.insert(id.into(), artifact);
    }

    pub fn len(&self) -> usize {
        match self.artifacts.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn read(&self, id: &str) -> Result<Artifact, ArtifactError> {
        let artifacts = match self.artifacts.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        artifacts
            .get(id)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(id.to_string()))
    }
}

/// Artifacts stored as plain files under a root directory; the id is the
/// file's path relative to the root.
#[derive(Debug, Clone)]
pub struct DirectoryArtifactStore {
    root: PathBuf,
}

impl DirectoryArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStore for DirectoryArtifactStore {
    async fn read(&self, id: &str) -> Result<Artifact, ArtifactError> {
        validate_file_name(id).map_err(|rule| ArtifactError::InvalidId {
            id: id.to_string(),
            rule,
        })?;

        let path = self.root.join(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(id, path = %path.display(), bytes = bytes.len(), "Read artifact");

        Ok(Artifact {
            filename: id.to_string(),
            content: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}
