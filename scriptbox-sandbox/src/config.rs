//! Configuration for the sandbox service

use crate::limits::ResourceLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Timeout applied to plans that do not set one
    #[serde(default = "SandboxConfig::default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Isolate limits
    #[serde(default)]
    pub limits: ResourceLimits,
    /// Bundler configuration
    #[serde(default)]
    pub bundler: BundlerConfig,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: Self::default_timeout_ms(),
            limits: ResourceLimits::default(),
            bundler: BundlerConfig::default(),
        }
    }
}

impl SandboxConfig {
    fn default_timeout_ms() -> u64 {
        scriptbox_common::DEFAULT_TIMEOUT_MS
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Bundler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundlerConfig {
    /// Path to the esbuild binary
    #[serde(default = "BundlerConfig::default_esbuild_path")]
    pub esbuild_path: PathBuf,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            esbuild_path: Self::default_esbuild_path(),
        }
    }
}

impl BundlerConfig {
    fn default_esbuild_path() -> PathBuf {
        PathBuf::from("esbuild")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SandboxConfig::from_toml_str("").unwrap();
        assert_eq!(config, SandboxConfig::default());
        assert_eq!(config.default_timeout_ms, 10_000);
        assert_eq!(config.bundler.esbuild_path, PathBuf::from("esbuild"));
    }

    #[test]
    fn test_full_config() {
        let config = SandboxConfig::from_toml_str(
            r#"
default_timeout_ms = 5000

[limits]
max_memory_bytes = 67108864
watchdog_interval = "50ms"
max_output_bytes = 65536

[bundler]
esbuild_path = "/opt/esbuild/bin/esbuild"
"#,
        )
        .unwrap();

        assert_eq!(config.default_timeout_ms, 5000);
        assert_eq!(config.limits.max_memory_bytes, Some(64 * 1024 * 1024));
        assert_eq!(config.limits.watchdog_interval, Duration::from_millis(50));
        assert_eq!(config.limits.max_output_bytes, 65536);
        assert_eq!(
            config.bundler.esbuild_path,
            PathBuf::from("/opt/esbuild/bin/esbuild")
        );
    }

    #[test]
    fn test_partial_limits_keep_defaults() {
        let config = SandboxConfig::from_toml_str("[limits]\nwatchdog_interval = \"1s\"\n").unwrap();
        assert_eq!(config.limits.watchdog_interval, Duration::from_secs(1));
        assert_eq!(config.limits.max_memory_bytes, Some(128 * 1024 * 1024));
    }

    #[test]
    fn test_invalid_config() {
        let err = SandboxConfig::from_toml_str("default_timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scriptbox.toml");
        let config = SandboxConfig {
            default_timeout_ms: 2500,
            ..Default::default()
        };
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        assert_eq!(SandboxConfig::load(&path).unwrap(), config);
        assert!(matches!(
            SandboxConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
