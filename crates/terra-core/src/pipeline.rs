//! Pipeline context and top-level pipeline config

use std::path::Path;

use serde::{Deserialize, Serialize};
use terra_config::{Config, ConfigError};

use crate::dataset_config::{DatasetConfig, DatasetScenes};
use crate::error::DataResult;
use crate::label_store::LabelStoreConfig;
use crate::scene_config::SceneConfig;
use crate::uri;

/// What a pipeline lends to the configs it updates
pub trait PipelineContext {
    /// Label store installed on scenes that have none
    fn get_default_label_store(&self, scene: &SceneConfig) -> LabelStoreConfig;

    /// Directory URI under which label stores derive their URIs
    fn predict_uri(&self) -> Option<String> {
        None
    }
}

/// Learning task a pipeline trains for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    SemanticSegmentation,
    ObjectDetection,
}

/// Root config of a training pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type_hint", rename = "pipeline", deny_unknown_fields)]
pub struct PipelineConfig {
    /// Output root; predictions go to `<root_uri>/predict`
    pub root_uri: String,
    pub task: TaskKind,
    pub dataset: DatasetConfig,
}

impl PipelineConfig {
    #[must_use]
    pub fn new(root_uri: impl Into<String>, task: TaskKind, dataset: DatasetConfig) -> Self {
        Self {
            root_uri: root_uri.into(),
            task,
            dataset,
        }
    }

    /// Validate, then update every scene against this pipeline
    ///
    /// # Errors
    /// Returns the first validation error
    pub fn update(self) -> DataResult<Self> {
        self.validate()?;
        let dataset = self.dataset.clone().update(Some(&self))?;
        Ok(Self { dataset, ..self })
    }

    /// Build every scene of the dataset
    ///
    /// # Errors
    /// Returns the first scene build error
    pub fn build_scenes(&self, tmp_dir: &Path, use_transformers: bool) -> DataResult<DatasetScenes> {
        self.dataset.build_scenes(tmp_dir, use_transformers)
    }
}

impl Config for PipelineConfig {
    const TYPE_HINT: &'static str = "pipeline";
    const VERSION: u32 = 1;

    fn validate(&self) -> Result<(), ConfigError> {
        if self.root_uri.trim().is_empty() {
            return Err(ConfigError::validation(Self::TYPE_HINT, "root_uri must not be empty"));
        }
        self.dataset.validate()
    }
}

impl PipelineContext for PipelineConfig {
    fn get_default_label_store(&self, _scene: &SceneConfig) -> LabelStoreConfig {
        match self.task {
            TaskKind::SemanticSegmentation => LabelStoreConfig::semantic_segmentation(None),
            TaskKind::ObjectDetection => LabelStoreConfig::object_detection(None),
        }
    }

    fn predict_uri(&self) -> Option<String> {
        Some(uri::join(&self.root_uri, "predict"))
    }
}
