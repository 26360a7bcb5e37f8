//! Integer-keyed maps in config mappings
//!
//! Mapping keys are always strings once persisted. Buffered deserialization
//! (internally tagged enums) does not coerce them back to integers, so keys
//! are parsed explicitly.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

pub(crate) fn deserialize<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
    K: FromStr + Ord,
    K::Err: Display,
    V: Deserialize<'de>,
{
    BTreeMap::<String, V>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, value)| {
            key.trim()
                .parse::<K>()
                .map(|k| (k, value))
                .map_err(|e| D::Error::custom(format!("invalid map key '{key}': {e}")))
        })
        .collect()
}
