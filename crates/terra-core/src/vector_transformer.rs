//! Vector transformers
//!
//! Transformers rewrite a GeoJSON feature collection (in pixel coordinates)
//! after it is read by a vector source. They run in the order configured.

use std::collections::BTreeMap;
use std::fmt;

use geo::Buffer;
use geojson::{Feature, FeatureCollection, JsonValue};
use serde::{Deserialize, Serialize};

use crate::class_config::ClassConfig;
use crate::error::{DataError, DataResult};

/// Feature property holding the class id
pub const CLASS_ID_KEY: &str = "class_id";

/// Feature property holding the class name
pub const CLASS_NAME_KEY: &str = "class_name";

/// Rewrites a feature collection
pub trait VectorTransformer: fmt::Debug + Send + Sync {
    /// Apply the transform
    ///
    /// # Errors
    /// Returns error if a geometry cannot be converted
    fn transform(&self, features: FeatureCollection) -> DataResult<FeatureCollection>;
}

/// GeoJSON geometry type name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    #[must_use]
    pub fn of(value: &geojson::Value) -> Self {
        match value {
            geojson::Value::Point(_) => Self::Point,
            geojson::Value::MultiPoint(_) => Self::MultiPoint,
            geojson::Value::LineString(_) => Self::LineString,
            geojson::Value::MultiLineString(_) => Self::MultiLineString,
            geojson::Value::Polygon(_) => Self::Polygon,
            geojson::Value::MultiPolygon(_) => Self::MultiPolygon,
            geojson::Value::GeometryCollection(_) => Self::GeometryCollection,
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Class id stored in a feature's properties
#[must_use]
pub fn feature_class_id(feature: &Feature) -> Option<u32> {
    feature
        .property(CLASS_ID_KEY)
        .and_then(JsonValue::as_u64)
        .and_then(|id| u32::try_from(id).ok())
}

/// Buffer applied to one class
///
/// Persisted as a number or `null`; `null` means no buffering.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum BufferAmount {
    #[default]
    NoBuffer,
    Distance(f64),
}

impl From<Option<f64>> for BufferAmount {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::NoBuffer, Self::Distance)
    }
}

impl From<BufferAmount> for Option<f64> {
    fn from(amount: BufferAmount) -> Self {
        match amount {
            BufferAmount::NoBuffer => None,
            BufferAmount::Distance(d) => Some(d),
        }
    }
}

/// Buffers geometries of one type, per class
///
/// Classes missing from `class_bufs` use `default_buf`, as do features
/// without a class id. Distances are in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BufferTransformer {
    pub geom_type: GeometryType,
    #[serde(default, deserialize_with = "crate::serde_keys::deserialize")]
    pub class_bufs: BTreeMap<u32, BufferAmount>,
    #[serde(default)]
    pub default_buf: BufferAmount,
}

impl BufferTransformer {
    #[must_use]
    pub fn new(geom_type: GeometryType) -> Self {
        Self {
            geom_type,
            class_bufs: BTreeMap::new(),
            default_buf: BufferAmount::NoBuffer,
        }
    }

    #[must_use]
    pub fn with_class_buf(mut self, class_id: u32, amount: impl Into<BufferAmount>) -> Self {
        self.class_bufs.insert(class_id, amount.into());
        self
    }

    #[must_use]
    pub fn with_default_buf(mut self, amount: impl Into<BufferAmount>) -> Self {
        self.default_buf = amount.into();
        self
    }

    /// Buffer for a class id
    #[must_use]
    pub fn buffer_for(&self, class_id: Option<u32>) -> BufferAmount {
        class_id
            .and_then(|id| self.class_bufs.get(&id).copied())
            .unwrap_or(self.default_buf)
    }

    fn buffer_feature(&self, mut feature: Feature) -> DataResult<Feature> {
        let amount = self.buffer_for(feature_class_id(&feature));
        let Some(geometry) = feature.geometry.as_mut() else {
            return Ok(feature);
        };
        if GeometryType::of(&geometry.value) != self.geom_type {
            return Ok(feature);
        }
        let BufferAmount::Distance(distance) = amount else {
            return Ok(feature);
        };

        let geom = geo::Geometry::<f64>::try_from(&geometry.value)
            .map_err(|e| DataError::invalid_geojson("<features>", e))?;
        let mut buffered = geom.buffer(distance);
        geometry.value = if buffered.0.len() == 1 {
            geojson::Value::from(&buffered.0.remove(0))
        } else {
            geojson::Value::from(&buffered)
        };
        geometry.bbox = None;
        Ok(feature)
    }
}

impl VectorTransformer for BufferTransformer {
    fn transform(&self, mut features: FeatureCollection) -> DataResult<FeatureCollection> {
        features.features = features
            .features
            .into_iter()
            .map(|f| self.buffer_feature(f))
            .collect::<DataResult<_>>()?;
        Ok(features)
    }
}

/// Settings for [`ClassInferenceTransformer`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassInferenceTransformerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_class_id: Option<u32>,
}

/// Fills in missing class ids
///
/// A feature keeps its `class_id` if it has one. Otherwise the id is looked
/// up from `class_name`, falling back to `default_class_id`. Features whose
/// class cannot be inferred are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassInferenceTransformer {
    class_config: Option<ClassConfig>,
    default_class_id: Option<u32>,
}

impl ClassInferenceTransformer {
    #[must_use]
    pub fn new(class_config: Option<ClassConfig>, default_class_id: Option<u32>) -> Self {
        Self {
            class_config,
            default_class_id,
        }
    }

    fn infer(&self, feature: &Feature) -> Option<u32> {
        feature_class_id(feature)
            .or_else(|| {
                let name = feature.property(CLASS_NAME_KEY)?.as_str()?;
                self.class_config.as_ref()?.get_class_id(name)
            })
            .or(self.default_class_id)
    }
}

impl VectorTransformer for ClassInferenceTransformer {
    fn transform(&self, mut features: FeatureCollection) -> DataResult<FeatureCollection> {
        let before = features.features.len();
        features.features = features
            .features
            .into_iter()
            .filter_map(|mut feature| {
                let class_id = self.infer(&feature)?;
                feature.set_property(CLASS_ID_KEY, class_id);
                Some(feature)
            })
            .collect();

        let dropped = before - features.features.len();
        if dropped > 0 {
            tracing::debug!("Dropped {} features without an inferable class", dropped);
        }
        Ok(features)
    }
}

/// Persisted vector transformer variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type_hint")]
pub enum VectorTransformerConfig {
    #[serde(rename = "buffer_transformer")]
    Buffer(BufferTransformer),
    #[serde(rename = "class_inference_transformer")]
    ClassInference(ClassInferenceTransformerConfig),
}

impl VectorTransformerConfig {
    /// Type hints of every variant
    pub const TYPE_HINTS: [&'static str; 2] = ["buffer_transformer", "class_inference_transformer"];

    /// Build the runtime transformer
    #[must_use]
    pub fn build(&self, class_config: Option<&ClassConfig>) -> Box<dyn VectorTransformer> {
        match self {
            Self::Buffer(buffer) => Box::new(buffer.clone()),
            Self::ClassInference(cfg) => Box::new(ClassInferenceTransformer::new(
                class_config.cloned(),
                cfg.default_class_id,
            )),
        }
    }
}

impl From<BufferTransformer> for VectorTransformerConfig {
    fn from(buffer: BufferTransformer) -> Self {
        Self::Buffer(buffer)
    }
}

/// Run transformers in order
///
/// # Errors
/// Returns the first transformer error
pub fn apply_all(
    transformers: &[Box<dyn VectorTransformer>],
    features: FeatureCollection,
) -> DataResult<FeatureCollection> {
    transformers.iter().try_fold(features, |fc, t| t.transform(fc))
}
