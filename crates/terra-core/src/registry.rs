//! Registration of every config type in this crate

use std::path::Path;

use once_cell::sync::Lazy;
use terra_config::{Config, ConfigDocument, ConfigRegistry, RegistryEntry};

use crate::class_config::ClassConfig;
use crate::dataset_config::DatasetConfig;
use crate::error::DataResult;
use crate::label_source::LabelSourceConfig;
use crate::label_store::LabelStoreConfig;
use crate::pipeline::PipelineConfig;
use crate::raster_source::{RasterSourceConfig, RasterTransformerConfig};
use crate::scene_config::{scene_config_upgrader, SceneConfig};
use crate::vector_source::{geojson_vector_source_upgrader, VectorSourceConfig};
use crate::vector_transformer::VectorTransformerConfig;

static CORE_REGISTRY: Lazy<ConfigRegistry> = Lazy::new(build_core_registry);

/// Registry of every config type in this crate, built once per process
#[must_use]
pub fn core_registry() -> &'static ConfigRegistry {
    &CORE_REGISTRY
}

/// Fresh registry with every config type in this crate
///
/// Start from this to register plugin configs alongside the core ones.
#[must_use]
pub fn build_core_registry() -> ConfigRegistry {
    let mut registry = ConfigRegistry::new();

    registry.register_config::<SceneConfig>(Some(scene_config_upgrader));
    registry.register_config::<ClassConfig>(None);
    registry.register_config::<DatasetConfig>(None);
    registry.register_config::<PipelineConfig>(None);

    registry.register(
        RegistryEntry::new(VectorSourceConfig::GEOJSON_TYPE_HINT, VectorSourceConfig::GEOJSON_VERSION)
            .with_upgrader(geojson_vector_source_upgrader),
    );

    let variants = RasterSourceConfig::TYPE_HINTS
        .into_iter()
        .chain(RasterTransformerConfig::TYPE_HINTS)
        .chain(VectorTransformerConfig::TYPE_HINTS)
        .chain(LabelSourceConfig::TYPE_HINTS)
        .chain(LabelStoreConfig::TYPE_HINTS);
    for type_hint in variants {
        registry.register(RegistryEntry::new(type_hint, 1));
    }

    tracing::debug!("Core registry built with {} config types", registry.len());
    registry
}

/// Load, upgrade and validate a config file against the core registry
///
/// # Errors
/// Returns error if the file cannot be read, upgraded or validated
pub fn load_config<T: Config>(path: impl AsRef<Path>) -> DataResult<T> {
    Ok(ConfigDocument::load(path)?.into_config(core_registry())?)
}

/// Save a config with versions stamped, format chosen by extension
///
/// # Errors
/// Returns error if serialization or writing fails
pub fn save_config<T: Config>(config: &T, path: impl AsRef<Path>) -> DataResult<()> {
    ConfigDocument::from_config(config, core_registry())?.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_type_hint() {
        let registry = core_registry();
        assert_eq!(registry.current_version("scene"), Some(5));
        assert_eq!(registry.current_version("geojson_vector_source"), Some(2));
        assert_eq!(registry.current_version("buffer_transformer"), Some(1));
        assert!(registry.get("scene").is_some_and(RegistryEntry::has_upgrader));
        assert_eq!(registry.len(), 13);
    }

    #[test]
    fn plugins_extend_a_copy() {
        let mut registry = build_core_registry();
        registry.register(RegistryEntry::new("plugin_source", 3));
        assert!(registry.contains("plugin_source"));
        assert!(!core_registry().contains("plugin_source"));
    }
}
