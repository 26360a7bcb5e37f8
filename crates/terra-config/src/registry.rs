//! Config registry and schema upgrades
//!
//! Provides [`ConfigRegistry`], the explicit registration table mapping a
//! config type hint to its current schema version and optional upgrader.
//! Every config variant must be registered before a mapping that mentions it
//! can be upgraded or serialized.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::config::{json_kind, type_hint_of, Config, ConfigDict, TYPE_HINT_KEY, VERSION_KEY};
use crate::error::ConfigError;

/// Upgrade function for one schema step
///
/// Receives a mapping written at `version` and returns it in the shape of
/// `version + 1`. Must be pure; returning an error aborts the whole load.
pub type Upgrader = fn(ConfigDict, u32) -> Result<ConfigDict, ConfigError>;

/// Which serde container consumes a config's `type_hint`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagPlacement {
    /// Struct carrying `#[serde(tag = "type_hint", rename = "...")]`
    ///
    /// serde writes the key but does not read it back, so the registry
    /// removes it before deserializing.
    Struct,
    /// Variant of an internally tagged enum, which reads the key itself
    Variant,
}

/// Registration of one config type
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    type_hint: &'static str,
    version: u32,
    upgrader: Option<Upgrader>,
    placement: TagPlacement,
}

impl RegistryEntry {
    /// Create entry for an enum variant, without an upgrader
    #[inline]
    #[must_use]
    pub fn new(type_hint: &'static str, version: u32) -> Self {
        Self {
            type_hint,
            version,
            upgrader: None,
            placement: TagPlacement::Variant,
        }
    }

    /// Create entry for a typed config struct
    #[inline]
    #[must_use]
    pub fn for_config<T: Config>() -> Self {
        Self::new(T::TYPE_HINT, T::VERSION).with_placement(TagPlacement::Struct)
    }

    /// Set which container consumes the `type_hint`
    #[inline]
    #[must_use]
    pub fn with_placement(mut self, placement: TagPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Attach the upgrader applied to each older version
    #[inline]
    #[must_use]
    pub fn with_upgrader(mut self, upgrader: Upgrader) -> Self {
        self.upgrader = Some(upgrader);
        self
    }

    /// Registered type hint
    #[inline]
    #[must_use]
    pub fn type_hint(&self) -> &'static str {
        self.type_hint
    }

    /// Current schema version
    #[inline]
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Whether an upgrader is attached
    #[inline]
    #[must_use]
    pub fn has_upgrader(&self) -> bool {
        self.upgrader.is_some()
    }

    #[inline]
    #[must_use]
    pub fn placement(&self) -> TagPlacement {
        self.placement
    }

    /// Bring a single mapping (not its children) to the current version
    fn upgrade_dict(&self, mut dict: ConfigDict) -> Result<ConfigDict, ConfigError> {
        let found = self.read_version(&dict)?;
        if found > self.version {
            return Err(ConfigError::FutureVersion {
                type_hint: self.type_hint.to_string(),
                found,
                current: self.version,
            });
        }

        if let Some(upgrader) = self.upgrader {
            for version in found..self.version {
                tracing::debug!(
                    "Upgrading '{}' config from version {} to {}",
                    self.type_hint,
                    version,
                    version + 1
                );
                dict = upgrader(dict, version)?;
            }
        }

        dict.insert(VERSION_KEY.to_string(), JsonValue::from(self.version));
        Ok(dict)
    }

    /// Version a mapping was written with; missing means current
    fn read_version(&self, dict: &ConfigDict) -> Result<u32, ConfigError> {
        match dict.get(VERSION_KEY) {
            None | Some(JsonValue::Null) => Ok(self.version),
            Some(value) => value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| ConfigError::InvalidVersion {
                    type_hint: self.type_hint.to_string(),
                    value: value.to_string(),
                }),
        }
    }
}

/// Registration table of config types
///
/// Built explicitly at startup; there is no reflection-based discovery.
#[derive(Debug, Default, Clone)]
pub struct ConfigRegistry {
    entries: HashMap<&'static str, RegistryEntry>,
}

impl ConfigRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a config type
    ///
    /// Returns the previous entry if the type hint was already registered.
    pub fn register(&mut self, entry: RegistryEntry) -> Option<RegistryEntry> {
        let previous = self.entries.insert(entry.type_hint, entry);
        if previous.is_some() {
            tracing::warn!("Replacing registry entry for '{}'", entry.type_hint);
        }
        previous
    }

    /// Register a typed config, optionally with an upgrader
    pub fn register_config<T: Config>(&mut self, upgrader: Option<Upgrader>) -> Option<RegistryEntry> {
        let mut entry = RegistryEntry::for_config::<T>();
        entry.upgrader = upgrader;
        self.register(entry)
    }

    /// Get entry for type hint
    #[inline]
    #[must_use]
    pub fn get(&self, type_hint: &str) -> Option<&RegistryEntry> {
        self.entries.get(type_hint)
    }

    /// Check if type hint is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, type_hint: &str) -> bool {
        self.entries.contains_key(type_hint)
    }

    /// Current version registered for a type hint
    #[inline]
    #[must_use]
    pub fn current_version(&self, type_hint: &str) -> Option<u32> {
        self.get(type_hint).map(RegistryEntry::version)
    }

    /// All registered type hints, sorted
    #[must_use]
    pub fn type_hints(&self) -> Vec<&'static str> {
        let mut hints: Vec<_> = self.entries.keys().copied().collect();
        hints.sort_unstable();
        hints
    }

    /// Get number of registered types
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Upgrade a persisted mapping and every nested config to current versions
    ///
    /// Parents are upgraded before their children, so an upgrader may
    /// restructure nested mappings and the result is still walked.
    ///
    /// # Errors
    /// - [`ConfigError::UnknownTypeHint`] for unregistered type hints
    /// - [`ConfigError::InvalidVersion`] / [`ConfigError::FutureVersion`]
    /// - any error raised by an upgrader, unchanged
    pub fn upgrade(&self, dict: ConfigDict) -> Result<ConfigDict, ConfigError> {
        self.upgrade_mapping(dict)
    }

    /// Upgrade any JSON value, walking mappings and sequences
    ///
    /// # Errors
    /// See [`ConfigRegistry::upgrade`]
    pub fn upgrade_value(&self, value: JsonValue) -> Result<JsonValue, ConfigError> {
        match value {
            JsonValue::Object(dict) => self.upgrade_mapping(dict).map(JsonValue::Object),
            JsonValue::Array(items) => items
                .into_iter()
                .map(|item| self.upgrade_value(item))
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            other => Ok(other),
        }
    }

    fn upgrade_mapping(&self, dict: ConfigDict) -> Result<ConfigDict, ConfigError> {
        let dict = match type_hint_of(&dict).map(str::to_owned) {
            Some(type_hint) => self.entry(&type_hint)?.upgrade_dict(dict)?,
            None => dict,
        };

        dict.into_iter()
            .map(|(key, value)| Ok((key, self.upgrade_value(value)?)))
            .collect()
    }

    /// Stamp the current version on every nested config mapping
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownTypeHint`] for unregistered type hints
    pub fn stamp_versions(&self, value: &mut JsonValue) -> Result<(), ConfigError> {
        match value {
            JsonValue::Object(dict) => {
                if let Some(type_hint) = type_hint_of(dict).map(str::to_owned) {
                    let version = self.entry(&type_hint)?.version;
                    dict.insert(VERSION_KEY.to_string(), JsonValue::from(version));
                }
                dict.values_mut().try_for_each(|v| self.stamp_versions(v))
            }
            JsonValue::Array(items) => items.iter_mut().try_for_each(|v| self.stamp_versions(v)),
            _ => Ok(()),
        }
    }

    /// Serialize a typed config to its persisted mapping
    ///
    /// # Errors
    /// Returns error if serialization fails or a nested type is unregistered
    pub fn to_dict<T: Config>(&self, config: &T) -> Result<ConfigDict, ConfigError> {
        let mut value = JsonValue::Object(config.to_raw_dict()?);
        self.stamp_versions(&mut value)?;
        match value {
            JsonValue::Object(dict) => Ok(dict),
            other => Err(ConfigError::NotAMapping(json_kind(&other).to_string())),
        }
    }

    /// Upgrade, deserialize and validate a persisted mapping
    ///
    /// A root mapping without a `type_hint` is read as `T`.
    ///
    /// # Errors
    /// - [`ConfigError::TypeHintMismatch`] if the root names another type
    /// - any error of [`ConfigRegistry::decode`] or [`Config::validate`]
    pub fn from_dict<T: Config>(&self, mut dict: ConfigDict) -> Result<T, ConfigError> {
        match type_hint_of(&dict) {
            None => {
                dict.insert(TYPE_HINT_KEY.to_string(), JsonValue::from(T::TYPE_HINT));
            }
            Some(found) if found != T::TYPE_HINT => {
                return Err(ConfigError::TypeHintMismatch {
                    expected: T::TYPE_HINT.to_string(),
                    found: found.to_string(),
                });
            }
            Some(_) => {}
        }

        let config: T = self.decode(dict)?;
        config.validate()?;
        Ok(config)
    }

    /// Upgrade a persisted mapping and deserialize it, without validation
    ///
    /// Works for any serde type, including the tagged enums that hold
    /// polymorphic config fields. Unknown fields are rejected by types that
    /// set `#[serde(deny_unknown_fields)]`.
    ///
    /// # Errors
    /// Returns error if upgrading or deserializing fails
    pub fn decode<T: DeserializeOwned>(&self, dict: ConfigDict) -> Result<T, ConfigError> {
        let mut value = JsonValue::Object(self.upgrade(dict)?);
        self.strip_bookkeeping(&mut value)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Remove the registry keys serde does not read
    ///
    /// `version` goes at every config boundary; `type_hint` only where the
    /// config struct itself is tagged.
    fn strip_bookkeeping(&self, value: &mut JsonValue) -> Result<(), ConfigError> {
        match value {
            JsonValue::Object(dict) => {
                if let Some(type_hint) = type_hint_of(dict).map(str::to_owned) {
                    dict.remove(VERSION_KEY);
                    if self.entry(&type_hint)?.placement == TagPlacement::Struct {
                        dict.remove(TYPE_HINT_KEY);
                    }
                }
                dict.values_mut().try_for_each(|v| self.strip_bookkeeping(v))
            }
            JsonValue::Array(items) => items.iter_mut().try_for_each(|v| self.strip_bookkeeping(v)),
            _ => Ok(()),
        }
    }

    fn entry(&self, type_hint: &str) -> Result<&RegistryEntry, ConfigError> {
        self.entries
            .get(type_hint)
            .ok_or_else(|| ConfigError::UnknownTypeHint(type_hint.to_string()))
    }
}
