//! Config trait
//!
//! Defines the interface for declarative, versioned configuration records.
//! Each config type specifies its registered type hint and schema version.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;

use crate::error::ConfigError;

/// Key holding the registered type hint of a config mapping
pub const TYPE_HINT_KEY: &str = "type_hint";

/// Key holding the schema version a config mapping was written with
pub const VERSION_KEY: &str = "version";

/// Persisted, untyped form of a config
pub type ConfigDict = serde_json::Map<String, JsonValue>;

/// Trait for top-level config types
///
/// Implementors serialize their own `type_hint` (usually through
/// `#[serde(tag = "type_hint", rename = "...")]`) so that the registry can
/// locate their entry when the mapping is loaded again. The registry strips
/// `type_hint` and `version` before deserializing, so implementors can set
/// `deny_unknown_fields`.
///
/// # Example
/// ```rust,ignore
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// #[serde(tag = "type_hint", rename = "class_config", deny_unknown_fields)]
/// pub struct ClassConfig {
///     pub names: Vec<String>,
/// }
///
/// impl Config for ClassConfig {
///     const TYPE_HINT: &'static str = "class_config";
///     const VERSION: u32 = 1;
/// }
/// ```
pub trait Config: Serialize + DeserializeOwned + Clone + std::fmt::Debug + PartialEq {
    /// Registered type hint
    const TYPE_HINT: &'static str;

    /// Current schema version
    const VERSION: u32;

    /// Check invariants that serde cannot express
    ///
    /// # Errors
    /// Returns [`ConfigError::Validation`] describing the first violation
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Serialize to an untyped mapping without version stamps
    ///
    /// Use [`ConfigRegistry::to_dict`](crate::ConfigRegistry::to_dict) for
    /// the persisted form.
    ///
    /// # Errors
    /// Returns error if the config does not serialize to a mapping
    fn to_raw_dict(&self) -> Result<ConfigDict, ConfigError> {
        match serde_json::to_value(self).map_err(|e| ConfigError::Serialization(e.to_string()))? {
            JsonValue::Object(dict) => Ok(dict),
            other => Err(ConfigError::NotAMapping(json_kind(&other).to_string())),
        }
    }
}

/// Short name of a JSON value's kind, for error messages
pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a sequence",
        JsonValue::Object(_) => "a mapping",
    }
}

/// Read the `type_hint` of a mapping, if it has one
#[inline]
#[must_use]
pub fn type_hint_of(dict: &ConfigDict) -> Option<&str> {
    dict.get(TYPE_HINT_KEY).and_then(JsonValue::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type_hint", rename = "probe")]
    struct ProbeConfig {
        name: String,
    }

    impl Config for ProbeConfig {
        const TYPE_HINT: &'static str = "probe";
        const VERSION: u32 = 2;
    }

    #[test]
    fn raw_dict_carries_type_hint() {
        let cfg = ProbeConfig {
            name: "a".to_string(),
        };
        let dict = cfg.to_raw_dict().unwrap();
        assert_eq!(type_hint_of(&dict), Some("probe"));
        assert_eq!(dict.get("name"), Some(&json!("a")));
        assert!(dict.get(VERSION_KEY).is_none());
    }

    #[test]
    fn type_hint_missing() {
        let dict = ConfigDict::new();
        assert_eq!(type_hint_of(&dict), None);
    }

    #[test]
    fn json_kind_names() {
        assert_eq!(json_kind(&json!([1])), "a sequence");
        assert_eq!(json_kind(&json!(null)), "null");
    }
}
