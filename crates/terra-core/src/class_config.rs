//! Class definitions shared by label sources, stores and transformers

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use terra_config::{Config, ConfigError};

/// Ordered class names; the class id is the index into `names`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type_hint", rename = "class_config", deny_unknown_fields)]
pub struct ClassConfig {
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_class: Option<String>,
}

impl ClassConfig {
    #[must_use]
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            colors: None,
            null_class: None,
        }
    }

    #[must_use]
    pub fn with_colors<S: Into<String>>(mut self, colors: impl IntoIterator<Item = S>) -> Self {
        self.colors = Some(colors.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_null_class(mut self, name: impl Into<String>) -> Self {
        self.null_class = Some(name.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Class id for a name
    #[must_use]
    pub fn get_class_id(&self, name: &str) -> Option<u32> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| u32::try_from(i).ok())
    }

    /// Class name for an id
    #[must_use]
    pub fn get_name(&self, class_id: u32) -> Option<&str> {
        self.names.get(class_id as usize).map(String::as_str)
    }

    #[must_use]
    pub fn null_class_id(&self) -> Option<u32> {
        self.null_class.as_deref().and_then(|name| self.get_class_id(name))
    }
}

impl Config for ClassConfig {
    const TYPE_HINT: &'static str = "class_config";
    const VERSION: u32 = 1;

    fn validate(&self) -> Result<(), ConfigError> {
        if self.names.is_empty() {
            return Err(ConfigError::validation(Self::TYPE_HINT, "names must not be empty"));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(ConfigError::validation(
                Self::TYPE_HINT,
                format!("duplicate class name '{dup}'"),
            ));
        }

        if let Some(colors) = &self.colors {
            if colors.len() != self.names.len() {
                return Err(ConfigError::validation(
                    Self::TYPE_HINT,
                    format!("{} colors for {} classes", colors.len(), self.names.len()),
                ));
            }
        }

        if let Some(null_class) = &self.null_class {
            if self.get_class_id(null_class).is_none() {
                return Err(ConfigError::validation(
                    Self::TYPE_HINT,
                    format!("null_class '{null_class}' is not one of names"),
                ));
            }
        }

        Ok(())
    }
}
