//! Ground-truth label sources

use std::path::Path;

use geo::{BoundingRect, Intersects, Rect};
use geojson::{Feature, JsonValue};
use serde::{Deserialize, Serialize};

use crate::class_config::ClassConfig;
use crate::crs::SharedCrsTransformer;
use crate::error::{DataError, DataResult};
use crate::extent::PixelBox;
use crate::pipeline::PipelineContext;
use crate::raster_source::{RasterSource, RasterSourceConfig};
use crate::scene_config::SceneConfig;
use crate::vector_source::VectorSourceConfig;
use crate::vector_transformer::feature_class_id;

/// Feature property holding a prediction score
pub const SCORE_KEY: &str = "score";

/// Per-pixel class ids of one window, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMap {
    pub window: PixelBox,
    pub data: Vec<u32>,
}

impl ClassMap {
    /// Map of a window filled with one class
    #[must_use]
    pub fn filled(window: PixelBox, class_id: u32) -> Self {
        Self {
            window,
            data: vec![class_id; window.area() as usize],
        }
    }

    /// Class id at (`row`, `col`) relative to the window origin
    #[inline]
    #[must_use]
    pub fn get(&self, row: u32, col: u32) -> u32 {
        self.data[row as usize * self.window.width() as usize + col as usize]
    }

    #[inline]
    pub fn set(&mut self, row: u32, col: u32, class_id: u32) {
        let width = self.window.width() as usize;
        self.data[row as usize * width + col as usize] = class_id;
    }
}

/// Axis-aligned object box in pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLabel {
    pub bbox: Rect<f64>,
    pub class_id: u32,
    pub score: Option<f64>,
}

impl ObjectLabel {
    /// Box from a labeled feature
    ///
    /// Returns `Ok(None)` for features without geometry.
    ///
    /// # Errors
    /// Returns [`DataError::MissingClassId`] if the feature has no class id
    pub fn from_feature(uri: &str, index: usize, feature: &Feature) -> DataResult<Option<Self>> {
        let Some(geometry) = &feature.geometry else {
            return Ok(None);
        };
        let class_id = feature_class_id(feature).ok_or_else(|| DataError::MissingClassId {
            uri: uri.to_string(),
            index,
        })?;
        let geom = geo::Geometry::<f64>::try_from(&geometry.value).map_err(|e| DataError::invalid_geojson(uri, e))?;

        Ok(geom.bounding_rect().map(|bbox| Self {
            bbox,
            class_id,
            score: feature.property(SCORE_KEY).and_then(JsonValue::as_f64),
        }))
    }
}

/// Class-id raster settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SemanticSegmentationLabelSourceConfig {
    pub raster_source: RasterSourceConfig,
}

/// Vector box settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectDetectionLabelSourceConfig {
    pub vector_source: VectorSourceConfig,
}

/// Persisted label source variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type_hint")]
pub enum LabelSourceConfig {
    #[serde(rename = "semantic_segmentation_label_source")]
    SemanticSegmentation(SemanticSegmentationLabelSourceConfig),
    #[serde(rename = "object_detection_label_source")]
    ObjectDetection(ObjectDetectionLabelSourceConfig),
}

impl LabelSourceConfig {
    pub const TYPE_HINTS: [&'static str; 2] = ["semantic_segmentation_label_source", "object_detection_label_source"];

    /// Normalize against a pipeline
    #[must_use]
    pub fn update(&self, pipeline: Option<&dyn PipelineContext>, scene: &SceneConfig) -> Self {
        match self {
            Self::SemanticSegmentation(cfg) => {
                Self::SemanticSegmentation(SemanticSegmentationLabelSourceConfig {
                    raster_source: cfg.raster_source.update(pipeline, scene),
                })
            }
            Self::ObjectDetection(cfg) => Self::ObjectDetection(cfg.clone()),
        }
    }

    /// Build against the scene raster
    ///
    /// # Errors
    /// Returns error if the underlying raster or vector data cannot be read
    pub fn build(
        &self,
        class_config: &ClassConfig,
        crs_transformer: SharedCrsTransformer,
        extent: PixelBox,
        tmp_dir: &Path,
    ) -> DataResult<LabelSource> {
        match self {
            Self::SemanticSegmentation(cfg) => {
                let raster = cfg.raster_source.build(tmp_dir, true)?;
                if raster.extent() != extent {
                    tracing::warn!(
                        "Label raster {} extent {} differs from scene extent {}",
                        raster.uri(),
                        raster.extent(),
                        extent
                    );
                }
                Ok(LabelSource::SemanticSegmentation(SemanticSegmentationLabelSource { raster }))
            }
            Self::ObjectDetection(cfg) => {
                let source = cfg.vector_source.build(Some(class_config), crs_transformer);
                let features = source.get_geojson()?;
                let labels = features
                    .features
                    .iter()
                    .enumerate()
                    .filter_map(|(i, f)| ObjectLabel::from_feature(source.uri(), i, f).transpose())
                    .collect::<DataResult<Vec<_>>>()?;
                tracing::debug!("Loaded {} object labels from {}", labels.len(), source.uri());
                Ok(LabelSource::ObjectDetection(ObjectDetectionLabelSource { extent, labels }))
            }
        }
    }
}

/// Class ids read from the first band of a raster
#[derive(Debug)]
pub struct SemanticSegmentationLabelSource {
    raster: RasterSource,
}

impl SemanticSegmentationLabelSource {
    /// Class ids of a window
    ///
    /// # Errors
    /// Returns error if the window is outside the label raster
    pub fn get_labels(&self, window: &PixelBox) -> DataResult<ClassMap> {
        let chip = self.raster.get_chip(window)?;
        let data = chip
            .data
            .chunks_exact(chip.channels.max(1))
            .map(|pixel| pixel[0].max(0.0) as u32)
            .collect();
        Ok(ClassMap { window: *window, data })
    }

    #[must_use]
    pub fn extent(&self) -> PixelBox {
        self.raster.extent()
    }
}

/// Object boxes read from a vector source
#[derive(Debug)]
pub struct ObjectDetectionLabelSource {
    extent: PixelBox,
    labels: Vec<ObjectLabel>,
}

impl ObjectDetectionLabelSource {
    /// All labels
    #[must_use]
    pub fn labels(&self) -> &[ObjectLabel] {
        &self.labels
    }

    /// Labels whose box intersects `window`
    #[must_use]
    pub fn get_labels(&self, window: &PixelBox) -> Vec<ObjectLabel> {
        let rect = window.to_rect();
        self.labels
            .iter()
            .filter(|label| label.bbox.intersects(&rect))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn extent(&self) -> PixelBox {
        self.extent
    }
}

/// Built label source
#[derive(Debug)]
pub enum LabelSource {
    SemanticSegmentation(SemanticSegmentationLabelSource),
    ObjectDetection(ObjectDetectionLabelSource),
}

impl LabelSource {
    #[must_use]
    pub fn extent(&self) -> PixelBox {
        match self {
            Self::SemanticSegmentation(source) => source.extent(),
            Self::ObjectDetection(source) => source.extent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::IdentityCrsTransformer;
    use crate::raster_io;
    use crate::vector_source::GeoJsonVectorSourceConfig;
    use serde_json::json;
    use std::sync::Arc;

    fn classes() -> ClassConfig {
        ClassConfig::new(["background", "car"])
    }

    #[test]
    fn semantic_segmentation_reads_class_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.tif");
        raster_io::write_u8(&path, 3, 2, 1, &[0, 1, 1, 0, 0, 1], None).unwrap();

        let config = LabelSourceConfig::SemanticSegmentation(SemanticSegmentationLabelSourceConfig {
            raster_source: RasterSourceConfig::geotiff(path.display().to_string()),
        });
        let source = config
            .build(&classes(), Arc::new(IdentityCrsTransformer), PixelBox::from_size(2, 3), dir.path())
            .unwrap();
        let LabelSource::SemanticSegmentation(source) = source else {
            panic!("expected semantic segmentation source");
        };

        let labels = source.get_labels(&PixelBox::new(0, 1, 2, 3)).unwrap();
        assert_eq!(labels.data, vec![1, 1, 0, 1]);
        assert_eq!(labels.get(1, 1), 1);
    }

    #[test]
    fn object_detection_boxes_and_window_query() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boxes.json");
        let fc = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"class_id": 1, "score": 0.5},
                 "geometry": {"type": "Polygon", "coordinates": [[[1.0, 1.0], [3.0, 1.0], [3.0, 2.0], [1.0, 1.0]]]}},
                {"type": "Feature", "properties": {"class_name": "car"},
                 "geometry": {"type": "Point", "coordinates": [20.0, 20.0]}},
            ],
        });
        std::fs::write(&path, fc.to_string()).unwrap();

        let vector_source = GeoJsonVectorSourceConfig::new(path.display().to_string()).with_transformer(
            crate::vector_transformer::VectorTransformerConfig::ClassInference(Default::default()),
        );
        let config = LabelSourceConfig::ObjectDetection(ObjectDetectionLabelSourceConfig {
            vector_source: vector_source.into(),
        });
        let LabelSource::ObjectDetection(source) = config
            .build(&classes(), Arc::new(IdentityCrsTransformer), PixelBox::from_size(32, 32), dir.path())
            .unwrap()
        else {
            panic!("expected object detection source");
        };

        assert_eq!(source.labels().len(), 2);
        assert_eq!(source.labels()[0].score, Some(0.5));
        assert_eq!(source.labels()[1].class_id, 1);

        let hits = source.get_labels(&PixelBox::new(0, 0, 5, 5));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].bbox.width(), 2.0);
    }

    #[test]
    fn object_detection_requires_class_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boxes.json");
        let fc = json!({
            "type": "FeatureCollection",
            "features": [{"type": "Feature", "properties": {},
                          "geometry": {"type": "Point", "coordinates": [1.0, 1.0]}}],
        });
        std::fs::write(&path, fc.to_string()).unwrap();

        let config = LabelSourceConfig::ObjectDetection(ObjectDetectionLabelSourceConfig {
            vector_source: GeoJsonVectorSourceConfig::new(path.display().to_string()).into(),
        });
        let err = config
            .build(&classes(), Arc::new(IdentityCrsTransformer), PixelBox::from_size(8, 8), dir.path())
            .unwrap_err();
        assert!(matches!(err, DataError::MissingClassId { index: 0, .. }));
    }
}
