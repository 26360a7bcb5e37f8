//! Prediction label stores
//!
//! A label store without a URI gets one from the pipeline during `update`:
//! `<predict_uri>/<scene id><ext>`.

use std::path::Path;

use geo::Polygon;
use geojson::{Feature, FeatureCollection};
use serde::{Deserialize, Serialize};

use crate::class_config::ClassConfig;
use crate::crs::SharedCrsTransformer;
use crate::error::{DataError, DataResult};
use crate::extent::PixelBox;
use crate::label_source::{ClassMap, ObjectLabel, SCORE_KEY};
use crate::pipeline::PipelineContext;
use crate::raster_io;
use crate::scene_config::SceneConfig;
use crate::uri;
use crate::vector_source::{features_to_map, features_to_pixel, read_feature_collection};
use crate::vector_transformer::{CLASS_ID_KEY, CLASS_NAME_KEY};

/// Store settings shared by every variant
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelStoreUri {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Persisted label store variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type_hint")]
pub enum LabelStoreConfig {
    /// Single-band GeoTIFF of class ids
    #[serde(rename = "semantic_segmentation_label_store")]
    SemanticSegmentation(LabelStoreUri),
    /// EPSG:4326 GeoJSON boxes
    #[serde(rename = "object_detection_geojson_store")]
    ObjectDetectionGeoJson(LabelStoreUri),
}

impl LabelStoreConfig {
    pub const TYPE_HINTS: [&'static str; 2] = ["semantic_segmentation_label_store", "object_detection_geojson_store"];

    #[must_use]
    pub fn semantic_segmentation(uri: Option<String>) -> Self {
        Self::SemanticSegmentation(LabelStoreUri { uri })
    }

    #[must_use]
    pub fn object_detection(uri: Option<String>) -> Self {
        Self::ObjectDetectionGeoJson(LabelStoreUri { uri })
    }

    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        match self {
            Self::SemanticSegmentation(cfg) | Self::ObjectDetectionGeoJson(cfg) => cfg.uri.as_deref(),
        }
    }

    /// File extension of stored labels
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::SemanticSegmentation(_) => ".tif",
            Self::ObjectDetectionGeoJson(_) => ".json",
        }
    }

    /// Fill in the URI from the pipeline's prediction directory
    ///
    /// An explicit URI is kept as is.
    #[must_use]
    pub fn update(&self, pipeline: Option<&dyn PipelineContext>, scene: &SceneConfig) -> Self {
        let mut updated = self.clone();
        if self.uri().is_some() {
            return updated;
        }
        let Some(predict_uri) = pipeline.and_then(|p| p.predict_uri()) else {
            return updated;
        };

        let derived = uri::join(&predict_uri, &format!("{}{}", scene.id, self.extension()));
        match &mut updated {
            Self::SemanticSegmentation(cfg) | Self::ObjectDetectionGeoJson(cfg) => cfg.uri = Some(derived),
        }
        updated
    }

    /// Build against the scene raster
    ///
    /// # Errors
    /// Returns [`DataError::MissingStoreUri`] if no URI is set
    pub fn build(
        &self,
        class_config: &ClassConfig,
        crs_transformer: SharedCrsTransformer,
        extent: PixelBox,
        _tmp_dir: &Path,
    ) -> DataResult<LabelStore> {
        let uri = self.uri().ok_or(DataError::MissingStoreUri)?.to_string();
        let store = match self {
            Self::SemanticSegmentation(_) => LabelStore::SemanticSegmentation(SemanticSegmentationLabelStore {
                uri,
                extent,
                crs_transformer,
                fill_class_id: class_config.null_class_id().unwrap_or(0),
            }),
            Self::ObjectDetectionGeoJson(_) => LabelStore::ObjectDetection(ObjectDetectionGeoJsonStore {
                uri,
                crs_transformer,
                class_config: class_config.clone(),
            }),
        };
        tracing::debug!("Built label store for {}", store.uri());
        Ok(store)
    }
}

/// Writes class ids as a georeferenced GeoTIFF
#[derive(Debug)]
pub struct SemanticSegmentationLabelStore {
    uri: String,
    extent: PixelBox,
    crs_transformer: SharedCrsTransformer,
    fill_class_id: u32,
}

impl SemanticSegmentationLabelStore {
    /// Write labels covering any part of the extent
    ///
    /// Pixels outside `labels.window` get the null class (or 0).
    ///
    /// # Errors
    /// Returns error if `labels.data` does not cover its window, a class id
    /// exceeds 255 or writing fails
    pub fn save(&self, labels: &ClassMap) -> DataResult<()> {
        if labels.data.len() as u64 != labels.window.area() {
            return Err(DataError::raster(
                &self.uri,
                format!(
                    "class map has {} values for window {} of {} pixels",
                    labels.data.len(),
                    labels.window,
                    labels.window.area()
                ),
            ));
        }

        let mut full = ClassMap::filled(self.extent, self.fill_class_id);
        if let Some(overlap) = self.extent.intersection(&labels.window) {
            for row in overlap.ymin..overlap.ymax {
                for col in overlap.xmin..overlap.xmax {
                    let class_id = labels.get(row - labels.window.ymin, col - labels.window.xmin);
                    full.set(row - self.extent.ymin, col - self.extent.xmin, class_id);
                }
            }
        }

        let bytes = full
            .data
            .iter()
            .map(|&id| u8::try_from(id).map_err(|_| DataError::raster(&self.uri, format!("class id {id} exceeds 255"))))
            .collect::<DataResult<Vec<u8>>>()?;

        let path = uri::create_parent(&self.uri)?;
        let georeference = self.crs_transformer.georeference();
        raster_io::write_u8(
            &path,
            self.extent.width(),
            self.extent.height(),
            1,
            &bytes,
            georeference.as_ref(),
        )?;
        tracing::debug!("Saved class map to {}", self.uri);
        Ok(())
    }

    /// Read back the stored class map
    ///
    /// # Errors
    /// Returns error if the file cannot be decoded
    pub fn get_labels(&self) -> DataResult<ClassMap> {
        let raster = raster_io::read_data(&uri::local_path(&self.uri)?)?;
        Ok(ClassMap {
            window: PixelBox::from_size(raster.height, raster.width),
            data: raster.values.iter().step_by(raster.bands).map(|&v| v as u32).collect(),
        })
    }
}

/// Writes object boxes as EPSG:4326 GeoJSON
#[derive(Debug)]
pub struct ObjectDetectionGeoJsonStore {
    uri: String,
    crs_transformer: SharedCrsTransformer,
    class_config: ClassConfig,
}

impl ObjectDetectionGeoJsonStore {
    /// # Errors
    /// Returns error if a class id is unknown or writing fails
    pub fn save(&self, labels: &[ObjectLabel]) -> DataResult<()> {
        let features = labels
            .iter()
            .map(|label| -> DataResult<Feature> {
                let name = self
                    .class_config
                    .get_name(label.class_id)
                    .ok_or_else(|| DataError::UnknownClass(label.class_id.to_string()))?;
                let polygon: Polygon<f64> = label.bbox.to_polygon();
                let mut feature = Feature::from(geojson::Geometry::new(geojson::Value::from(&polygon)));
                feature.set_property(CLASS_ID_KEY, label.class_id);
                feature.set_property(CLASS_NAME_KEY, name);
                if let Some(score) = label.score {
                    feature.set_property(SCORE_KEY, score);
                }
                Ok(feature)
            })
            .collect::<DataResult<Vec<_>>>()?;

        let pixel = FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        };
        let map = features_to_map(&self.uri, pixel, self.crs_transformer.as_ref())?;
        let text = serde_json::to_string(&map).map_err(|e| DataError::Serialization(e.to_string()))?;
        uri::write_text(&self.uri, &text)?;
        tracing::debug!("Saved {} object labels to {}", labels.len(), self.uri);
        Ok(())
    }

    /// Read back stored boxes in pixel coordinates
    ///
    /// # Errors
    /// Returns error if the file cannot be read or a feature lacks a class id
    pub fn get_labels(&self) -> DataResult<Vec<ObjectLabel>> {
        let map = read_feature_collection(&self.uri, false)?;
        let pixel = features_to_pixel(&self.uri, map, self.crs_transformer.as_ref())?;
        pixel
            .features
            .iter()
            .enumerate()
            .filter_map(|(i, f)| ObjectLabel::from_feature(&self.uri, i, f).transpose())
            .collect()
    }
}

/// Built label store
#[derive(Debug)]
pub enum LabelStore {
    SemanticSegmentation(SemanticSegmentationLabelStore),
    ObjectDetection(ObjectDetectionGeoJsonStore),
}

impl LabelStore {
    #[must_use]
    pub fn uri(&self) -> &str {
        match self {
            Self::SemanticSegmentation(store) => &store.uri,
            Self::ObjectDetection(store) => &store.uri,
        }
    }
}
