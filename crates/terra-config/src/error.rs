//! Error types for versioned configs
//!
//! Covers the three places a config load can fail:
//! - Reading the persisted document (IO, JSON, YAML)
//! - Upgrading it to the current schema versions
//! - Deserializing and validating the typed config

use std::path::PathBuf;

/// Errors raised while loading, upgrading or validating configs
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A removed field holds a value that cannot be migrated automatically
    #[error("{field} is deprecated. {hint}")]
    Deprecated { field: String, hint: String },

    /// No registry entry for a `type_hint`
    #[error("no config registered for type hint '{0}'")]
    UnknownTypeHint(String),

    /// The `version` key is not a non-negative integer
    #[error("invalid version for '{type_hint}': {value}")]
    InvalidVersion { type_hint: String, value: String },

    /// The persisted version is newer than this build understands
    #[error("'{type_hint}' config has version {found}, newer than the supported version {current}")]
    FutureVersion {
        type_hint: String,
        found: u32,
        current: u32,
    },

    /// Root mapping names a different config type than requested
    #[error("expected a '{expected}' config, got '{found}'")]
    TypeHintMismatch { expected: String, found: String },

    /// Malformed JSON, or a mapping that does not fit the typed config
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Malformed YAML
    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    /// Document root is not a mapping
    #[error("expected a mapping at the config root, got {0}")]
    NotAMapping(String),

    /// File extension is not a known config format
    #[error("unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    /// IO error while reading or writing a config file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Typed config violates one of its invariants
    #[error("invalid '{type_hint}' config: {message}")]
    Validation { type_hint: String, message: String },

    /// Serialization of a typed config failed
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ConfigError {
    /// Create a deprecation error with a remediation hint
    pub fn deprecated(field: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Deprecated {
            field: field.into(),
            hint: hint.into(),
        }
    }

    /// Create a validation error for a config type
    pub fn validation(type_hint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            type_hint: type_hint.into(),
            message: message.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deprecated_display_carries_hint() {
        let err = ConfigError::deprecated("SceneConfig.aoi_geometries", "Use aoi_uris instead.");
        assert_eq!(
            err.to_string(),
            "SceneConfig.aoi_geometries is deprecated. Use aoi_uris instead."
        );
    }

    #[test]
    fn future_version_display() {
        let err = ConfigError::FutureVersion {
            type_hint: "scene".to_string(),
            found: 9,
            current: 5,
        };
        assert!(err.to_string().contains("version 9"));
        assert!(err.to_string().contains("supported version 5"));
    }

    #[test]
    fn json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ConfigError = json_err.into();
        assert!(matches!(err, ConfigError::InvalidJson(_)));
    }
}
