//! Persisted config documents
//!
//! JSON/YAML representation of a config mapping, with file loading by
//! extension. Typed configs are produced through a [`ConfigRegistry`] so
//! that documents written by older releases are upgraded first.

use std::path::Path;

use serde_json::Value as JsonValue;

use crate::config::{json_kind, type_hint_of, Config, ConfigDict, VERSION_KEY};
use crate::error::ConfigError;
use crate::registry::ConfigRegistry;

/// Serialization format of a config document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
}

impl ConfigFormat {
    /// Detect format from a file extension
    ///
    /// # Errors
    /// Returns [`ConfigError::UnsupportedFormat`] for unknown extensions
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Supported file extensions (without dot)
    #[inline]
    #[must_use]
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Json => &["json"],
            Self::Yaml => &["yaml", "yml"],
        }
    }
}

/// Untyped config document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigDocument {
    dict: ConfigDict,
}

impl ConfigDocument {
    /// Create from a mapping
    #[inline]
    #[must_use]
    pub fn new(dict: ConfigDict) -> Self {
        Self { dict }
    }

    /// Create from a JSON value
    ///
    /// # Errors
    /// Returns [`ConfigError::NotAMapping`] unless the value is a mapping
    pub fn from_value(value: JsonValue) -> Result<Self, ConfigError> {
        match value {
            JsonValue::Object(dict) => Ok(Self::new(dict)),
            other => Err(ConfigError::NotAMapping(json_kind(&other).to_string())),
        }
    }

    /// Parse from JSON string
    ///
    /// # Errors
    /// Returns error if JSON is invalid or not a mapping
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Parse from YAML string
    ///
    /// # Errors
    /// Returns error if YAML is invalid or not a mapping
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_yaml::from_str(yaml)?)
    }

    /// Parse from string in the given format
    ///
    /// # Errors
    /// Returns error if the content is invalid for the format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Json => Self::from_json(content),
            ConfigFormat::Yaml => Self::from_yaml(content),
        }
    }

    /// Read a config file, choosing the format from its extension
    ///
    /// # Errors
    /// Returns error on unknown extension, IO failure or invalid content
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        tracing::debug!("Loaded config document from {}", path.display());
        Self::parse(&content, format)
    }

    /// Write a config file, choosing the format from its extension
    ///
    /// # Errors
    /// Returns error on unknown extension, serialization or IO failure
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Json => self.to_json()?,
            ConfigFormat::Yaml => self.to_yaml()?,
        };
        std::fs::write(path, content).map_err(|e| ConfigError::io_error(path, e))
    }

    /// Serialize a typed config with version stamps
    ///
    /// # Errors
    /// Returns error if serialization fails or a nested type is unregistered
    pub fn from_config<T: Config>(config: &T, registry: &ConfigRegistry) -> Result<Self, ConfigError> {
        registry.to_dict(config).map(Self::new)
    }

    /// Upgrade and deserialize into a typed config
    ///
    /// # Errors
    /// Returns error if upgrading, deserializing or validating fails
    pub fn into_config<T: Config>(self, registry: &ConfigRegistry) -> Result<T, ConfigError> {
        registry.from_dict(self.dict)
    }

    /// Get the mapping
    #[inline]
    #[must_use]
    pub fn dict(&self) -> &ConfigDict {
        &self.dict
    }

    /// Take the mapping
    #[inline]
    #[must_use]
    pub fn into_dict(self) -> ConfigDict {
        self.dict
    }

    /// Root type hint, if present
    #[inline]
    #[must_use]
    pub fn type_hint(&self) -> Option<&str> {
        type_hint_of(&self.dict)
    }

    /// Root schema version, if present
    #[inline]
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.dict.get(VERSION_KEY).and_then(JsonValue::as_u64)
    }

    /// Get a value by JSON pointer
    ///
    /// # Examples
    /// ```
    /// # use terra_config::ConfigDocument;
    /// # use serde_json::json;
    /// let doc = ConfigDocument::from_value(json!({"raster_source": {"uri": "a.tif"}})).unwrap();
    /// assert_eq!(doc.get("/raster_source/uri"), Some(&json!("a.tif")));
    /// ```
    #[inline]
    #[must_use]
    pub fn get(&self, pointer: &str) -> Option<&JsonValue> {
        if pointer.is_empty() {
            return None;
        }
        let mut segments = pointer.trim_start_matches('/').splitn(2, '/');
        let head = segments.next()?;
        let value = self.dict.get(head)?;
        match segments.next() {
            Some(rest) => value.pointer(&format!("/{rest}")),
            None => Some(value),
        }
    }

    /// Serialize to pretty JSON string
    ///
    /// # Errors
    /// Returns error if serialization fails (rare for JSON)
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(&self.dict).map_err(|e| ConfigError::Serialization(e.to_string()))
    }

    /// Serialize to YAML string
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.dict).map_err(|e| ConfigError::Serialization(e.to_string()))
    }
}

impl From<ConfigDict> for ConfigDocument {
    fn from(dict: ConfigDict) -> Self {
        Self::new(dict)
    }
}

impl From<ConfigDocument> for JsonValue {
    fn from(doc: ConfigDocument) -> Self {
        JsonValue::Object(doc.dict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_from_json() {
        let doc = ConfigDocument::from_json(r#"{"type_hint": "scene", "version": 4, "id": "s1"}"#).unwrap();
        assert_eq!(doc.type_hint(), Some("scene"));
        assert_eq!(doc.version(), Some(4));
        assert_eq!(doc.get("/id"), Some(&json!("s1")));
    }

    #[test]
    fn document_from_yaml() {
        let doc = ConfigDocument::from_yaml("type_hint: scene\nid: s1\naoi_uris:\n  - a.geojson\n").unwrap();
        assert_eq!(doc.get("/aoi_uris/0"), Some(&json!("a.geojson")));
        assert_eq!(doc.version(), None);
    }

    #[test]
    fn document_rejects_non_mapping() {
        let err = ConfigDocument::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, ConfigError::NotAMapping(kind) if kind == "a sequence"));
    }

    #[test]
    fn document_invalid_json() {
        assert!(matches!(
            ConfigDocument::from_json("not valid json"),
            Err(ConfigError::InvalidJson(_))
        ));
    }

    #[test]
    fn format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a/b.json")).unwrap(), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("b.YML")).unwrap(), ConfigFormat::Yaml);
        assert!(ConfigFormat::from_path(Path::new("b.toml")).is_err());
        assert!(ConfigFormat::Yaml.extensions().contains(&"yml"));
    }

    #[test]
    fn save_and_load_both_formats() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ConfigDocument::from_value(json!({
            "type_hint": "scene",
            "version": 5,
            "aoi_uris": ["a.geojson", "b.geojson"],
        }))
        .unwrap();

        for name in ["scene.json", "scene.yaml"] {
            let path = dir.path().join(name);
            doc.save(&path).unwrap();
            let loaded = ConfigDocument::load(&path).unwrap();
            assert_eq!(loaded, doc);
        }
    }

    #[test]
    fn load_missing_file() {
        let err = ConfigDocument::load("/nonexistent/scene.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn get_empty_pointer() {
        let doc = ConfigDocument::default();
        assert_eq!(doc.get(""), None);
        assert_eq!(doc.get("/missing"), None);
    }
}
