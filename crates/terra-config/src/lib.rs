//! Terra Config
//!
//! Declarative, serializable configuration records with a versioned schema.
//!
//! # Core Concepts
//!
//! - [`Config`]: Trait for typed configs (type hint + schema version)
//! - [`ConfigRegistry`]: Explicit table of type hints, current versions and upgraders
//! - [`ConfigDocument`]: Persisted JSON/YAML form of a config mapping
//! - [`ConfigError`]: Structured load/upgrade/validation errors
//!
//! # Architecture
//!
//! ```text
//! file → ConfigDocument → ConfigRegistry::upgrade → serde → Config::validate → typed config
//!                                   ↑
//!                    per-type upgraders, one schema step at a time
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use terra_config::{ConfigDocument, ConfigRegistry};
//!
//! let registry: &ConfigRegistry = terra_core::core_registry();
//! let scene: SceneConfig = ConfigDocument::load("scene.yaml")?.into_config(registry)?;
//! ```

#![warn(unreachable_pub)]

mod config;
mod document;
mod error;
mod registry;

pub use config::{type_hint_of, Config, ConfigDict, TYPE_HINT_KEY, VERSION_KEY};
pub use document::{ConfigDocument, ConfigFormat};
pub use error::{ConfigError, ConfigResult};
pub use registry::{ConfigRegistry, RegistryEntry, TagPlacement, Upgrader};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
