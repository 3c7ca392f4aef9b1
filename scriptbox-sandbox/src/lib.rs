//! scriptbox sandbox - bundled script execution in V8 isolates
//!
//! Takes a validated plan of virtual files, bundles it into one script,
//! runs it in a fresh resource-bounded isolate and reports console output,
//! outcome and errors in terms of the original sources.

pub mod artifact;
pub mod bundle;
pub mod config;
mod limits;
pub mod report;
mod runtime;
mod service;
pub mod sourcemap;
mod types;

pub use artifact::{Artifact, ArtifactError, ArtifactStore, DirectoryArtifactStore, InMemoryArtifactStore};
pub use bundle::{BundleError, BundleMessage, BundleResult, Bundler, EsbuildBundler, PassthroughBundler};
pub use config::{BundlerConfig, ConfigError, SandboxConfig};
pub use limits::ResourceLimits;
pub use report::ExecutionReport;
pub use runtime::v8::{parse_location, BUNDLE_SOURCE};
pub use runtime::{Runtime, V8Runtime};
pub use service::{BuildFailure, Outcome, SandboxService, ServiceError, SyntaxCheck, CHECK_ENTRY, SCRIPT_ENTRY};
pub use sourcemap::{FormatError, OriginalPosition, SourceMap};
pub use types::{ExecutionId, ExecutionRequest, ExecutionResult, EXIT_TIMEOUT};

pub use scriptbox_common as common;

/// Re-export common error types
pub type Result<T> = anyhow::Result<T>;
