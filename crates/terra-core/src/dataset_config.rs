//! Dataset splits

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use terra_config::{Config, ConfigError};

use crate::class_config::ClassConfig;
use crate::error::DataResult;
use crate::pipeline::PipelineContext;
use crate::scene::Scene;
use crate::scene_config::SceneConfig;

/// Class definitions plus train, validation and test scenes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type_hint", rename = "dataset", deny_unknown_fields)]
pub struct DatasetConfig {
    pub class_config: ClassConfig,
    #[serde(default)]
    pub train_scenes: Vec<SceneConfig>,
    #[serde(default)]
    pub validation_scenes: Vec<SceneConfig>,
    #[serde(default)]
    pub test_scenes: Vec<SceneConfig>,
}

/// Built scenes of each split
#[derive(Debug, Default)]
pub struct DatasetScenes {
    pub train: Vec<Scene>,
    pub validation: Vec<Scene>,
    pub test: Vec<Scene>,
}

impl DatasetConfig {
    #[must_use]
    pub fn new(class_config: ClassConfig) -> Self {
        Self {
            class_config,
            train_scenes: Vec::new(),
            validation_scenes: Vec::new(),
            test_scenes: Vec::new(),
        }
    }

    /// Every scene, in split order
    pub fn all_scenes(&self) -> impl Iterator<Item = &SceneConfig> {
        self.train_scenes
            .iter()
            .chain(&self.validation_scenes)
            .chain(&self.test_scenes)
    }

    /// Validate, then update every scene
    ///
    /// # Errors
    /// Returns the first validation error
    pub fn update(self, pipeline: Option<&dyn PipelineContext>) -> DataResult<Self> {
        self.validate()?;
        let update_all = |scenes: Vec<SceneConfig>| {
            scenes
                .into_iter()
                .map(|s| s.update(pipeline))
                .collect::<DataResult<Vec<_>>>()
        };

        Ok(Self {
            train_scenes: update_all(self.train_scenes)?,
            validation_scenes: update_all(self.validation_scenes)?,
            test_scenes: update_all(self.test_scenes)?,
            class_config: self.class_config,
        })
    }

    /// Build every scene
    ///
    /// # Errors
    /// Returns the first scene build error
    pub fn build_scenes(&self, tmp_dir: &Path, use_transformers: bool) -> DataResult<DatasetScenes> {
        let build_all = |scenes: &[SceneConfig]| {
            scenes
                .iter()
                .map(|s| s.build(&self.class_config, tmp_dir, use_transformers))
                .collect::<DataResult<Vec<_>>>()
        };

        Ok(DatasetScenes {
            train: build_all(&self.train_scenes)?,
            validation: build_all(&self.validation_scenes)?,
            test: build_all(&self.test_scenes)?,
        })
    }
}

impl Config for DatasetConfig {
    const TYPE_HINT: &'static str = "dataset";
    const VERSION: u32 = 1;

    fn validate(&self) -> Result<(), ConfigError> {
        self.class_config.validate()?;

        let mut ids = HashSet::new();
        for scene in self.all_scenes() {
            scene.validate()?;
            if !ids.insert(scene.id.as_str()) {
                return Err(ConfigError::validation(
                    Self::TYPE_HINT,
                    format!("duplicate scene id '{}'", scene.id),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster_source::RasterSourceConfig;

    fn scene(id: &str) -> SceneConfig {
        SceneConfig::new(id, RasterSourceConfig::geotiff(format!("{id}.tif")))
    }

    #[test]
    fn duplicate_ids_across_splits() {
        let mut dataset = DatasetConfig::new(ClassConfig::new(["a"]));
        dataset.train_scenes.push(scene("s1"));
        dataset.test_scenes.push(scene("s1"));

        let err = dataset.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate scene id 's1'"));
    }

    #[test]
    fn invalid_class_config_propagates() {
        let dataset = DatasetConfig::new(ClassConfig::new(Vec::<String>::new()));
        assert!(matches!(dataset.validate(), Err(ConfigError::Validation { ref type_hint, .. }) if type_hint == "class_config"));
    }

    #[test]
    fn update_without_pipeline_keeps_stores_empty() {
        let mut dataset = DatasetConfig::new(ClassConfig::new(["a"]));
        dataset.train_scenes.push(scene("s1"));
        dataset.validation_scenes.push(scene("s2"));

        let updated = dataset.clone().update(None).unwrap();
        assert_eq!(updated, dataset);
        assert_eq!(updated.all_scenes().count(), 2);
    }
}
