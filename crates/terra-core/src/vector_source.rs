//! GeoJSON vector sources
//!
//! Features are read in EPSG:4326, reprojected into the pixel coordinates of
//! the scene raster, then passed through the configured vector transformers.

use geo::{Geometry, MapCoords};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use terra_config::{ConfigDict, ConfigError, TYPE_HINT_KEY};

use crate::class_config::ClassConfig;
use crate::crs::{CrsTransformer, SharedCrsTransformer};
use crate::error::{DataError, DataResult};
use crate::uri;
use crate::vector_transformer::{self, VectorTransformer, VectorTransformerConfig};

const CRS_KEY: &str = "crs";

/// Field moved into a class inference transformer at version 2
const LEGACY_DEFAULT_CLASS_ID: &str = "default_class_id";

/// Read a local GeoJSON document as a feature collection
///
/// Bare geometries and single features are wrapped. Unless `ignore_crs` is
/// set, a top-level `crs` member naming anything but EPSG:4326 is rejected.
///
/// # Errors
/// Returns error if the file cannot be read or parsed, or declares a foreign CRS
pub fn read_feature_collection(uri: &str, ignore_crs: bool) -> DataResult<FeatureCollection> {
    let text = uri::read_text(uri)?;
    let geojson: GeoJson = text.parse().map_err(|e| DataError::invalid_geojson(uri, e))?;

    let (foreign_members, features) = match geojson {
        GeoJson::FeatureCollection(fc) => (fc.foreign_members, fc.features),
        GeoJson::Feature(mut feature) => (feature.foreign_members.take(), vec![feature]),
        GeoJson::Geometry(mut geometry) => (geometry.foreign_members.take(), vec![Feature::from(geometry)]),
    };

    if !ignore_crs {
        check_crs(uri, foreign_members.as_ref())?;
    }

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

fn check_crs(uri: &str, foreign_members: Option<&JsonObject>) -> DataResult<()> {
    let Some(crs) = foreign_members.and_then(|m| m.get(CRS_KEY)) else {
        return Ok(());
    };

    let name = crs
        .pointer("/properties/name")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    let upper = name.to_ascii_uppercase();
    if upper.ends_with("CRS84") || upper.ends_with(":4326") {
        Ok(())
    } else {
        Err(DataError::UnexpectedCrs {
            uri: uri.to_string(),
            crs: if name.is_empty() { crs.to_string() } else { name.to_string() },
        })
    }
}

fn map_feature_coords<F>(uri: &str, mut features: FeatureCollection, f: F) -> DataResult<FeatureCollection>
where
    F: Fn(geo::Coord<f64>) -> geo::Coord<f64> + Copy,
{
    for feature in &mut features.features {
        if let Some(geometry) = feature.geometry.as_mut() {
            let geom = Geometry::<f64>::try_from(&geometry.value).map_err(|e| DataError::invalid_geojson(uri, e))?;
            geometry.value = geojson::Value::from(&geom.map_coords(f));
            geometry.bbox = None;
        }
        feature.bbox = None;
    }
    Ok(features)
}

/// Reproject every feature from EPSG:4326 to pixel coordinates
///
/// # Errors
/// Returns error if a geometry cannot be converted
pub fn features_to_pixel(
    uri: &str,
    features: FeatureCollection,
    crs: &dyn CrsTransformer,
) -> DataResult<FeatureCollection> {
    map_feature_coords(uri, features, |c| crs.map_to_pixel(c))
}

/// Reproject every feature from pixel coordinates to EPSG:4326
///
/// # Errors
/// Returns error if a geometry cannot be converted
pub fn features_to_map(
    uri: &str,
    features: FeatureCollection,
    crs: &dyn CrsTransformer,
) -> DataResult<FeatureCollection> {
    map_feature_coords(uri, features, |c| crs.pixel_to_map(c))
}

/// GeoJSON vector source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeoJsonVectorSourceConfig {
    pub uri: String,
    #[serde(default)]
    pub ignore_crs_field: bool,
    #[serde(default)]
    pub transformers: Vec<VectorTransformerConfig>,
}

impl GeoJsonVectorSourceConfig {
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ignore_crs_field: false,
            transformers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_transformer(mut self, transformer: impl Into<VectorTransformerConfig>) -> Self {
        self.transformers.push(transformer.into());
        self
    }
}

/// Persisted vector source variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type_hint")]
pub enum VectorSourceConfig {
    #[serde(rename = "geojson_vector_source")]
    GeoJson(GeoJsonVectorSourceConfig),
}

impl VectorSourceConfig {
    pub const GEOJSON_TYPE_HINT: &'static str = "geojson_vector_source";
    pub const GEOJSON_VERSION: u32 = 2;

    /// Build the runtime source
    #[must_use]
    pub fn build(&self, class_config: Option<&ClassConfig>, crs_transformer: SharedCrsTransformer) -> GeoJsonVectorSource {
        match self {
            Self::GeoJson(cfg) => GeoJsonVectorSource {
                uri: cfg.uri.clone(),
                ignore_crs_field: cfg.ignore_crs_field,
                crs_transformer,
                transformers: cfg.transformers.iter().map(|t| t.build(class_config)).collect(),
            },
        }
    }
}

impl From<GeoJsonVectorSourceConfig> for VectorSourceConfig {
    fn from(cfg: GeoJsonVectorSourceConfig) -> Self {
        Self::GeoJson(cfg)
    }
}

/// Upgrades `geojson_vector_source` mappings one version
///
/// Version 1 carried `default_class_id` inline; version 2 expresses it as a
/// leading `class_inference_transformer`.
///
/// # Errors
/// Returns [`ConfigError::Validation`] if `transformers` is not a sequence
pub fn geojson_vector_source_upgrader(mut dict: ConfigDict, version: u32) -> Result<ConfigDict, ConfigError> {
    if version != 1 {
        return Ok(dict);
    }

    let default_class_id = match dict.remove(LEGACY_DEFAULT_CLASS_ID) {
        None | Some(JsonValue::Null) => return Ok(dict),
        Some(value) => value,
    };

    let mut inference = ConfigDict::new();
    inference.insert(TYPE_HINT_KEY.to_string(), JsonValue::from("class_inference_transformer"));
    inference.insert(LEGACY_DEFAULT_CLASS_ID.to_string(), default_class_id);

    let transformers = dict
        .entry("transformers")
        .or_insert_with(|| JsonValue::Array(Vec::new()));
    if transformers.is_null() {
        *transformers = JsonValue::Array(Vec::new());
    }
    match transformers {
        JsonValue::Array(items) => items.insert(0, JsonValue::Object(inference)),
        _ => {
            return Err(ConfigError::validation(
                VectorSourceConfig::GEOJSON_TYPE_HINT,
                "transformers must be a sequence",
            ))
        }
    }
    Ok(dict)
}

/// Built GeoJSON vector source
#[derive(Debug)]
pub struct GeoJsonVectorSource {
    uri: String,
    ignore_crs_field: bool,
    crs_transformer: SharedCrsTransformer,
    transformers: Vec<Box<dyn VectorTransformer>>,
}

impl GeoJsonVectorSource {
    #[inline]
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Features in pixel coordinates after all transformers
    ///
    /// # Errors
    /// Returns error if reading, reprojection or a transformer fails
    pub fn get_geojson(&self) -> DataResult<FeatureCollection> {
        let features = read_feature_collection(&self.uri, self.ignore_crs_field)?;
        let features = features_to_pixel(&self.uri, features, self.crs_transformer.as_ref())?;
        let features = vector_transformer::apply_all(&self.transformers, features)?;
        tracing::debug!("Read {} features from {}", features.features.len(), self.uri);
        Ok(features)
    }

    /// Geometries in pixel coordinates
    ///
    /// # Errors
    /// See [`GeoJsonVectorSource::get_geojson`]
    pub fn get_geoms(&self) -> DataResult<Vec<Geometry<f64>>> {
        self.get_geojson()?
            .features
            .into_iter()
            .filter_map(|f| f.geometry)
            .map(|g| Geometry::<f64>::try_from(&g.value).map_err(|e| DataError::invalid_geojson(&self.uri, e)))
            .collect()
    }
}
