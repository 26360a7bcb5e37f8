//! Scene configuration
//!
//! [`SceneConfig`] ties one raster source to its optional ground truth,
//! prediction destination and areas of interest.
//!
//! # Schema history
//!
//! | version | change |
//! |---------|--------|
//! | 5       | `aoi_geometries` removed in favor of `aoi_uris` |

use std::path::Path;

use geo::{Geometry, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use terra_config::{Config, ConfigDict, ConfigError};

use crate::class_config::ClassConfig;
use crate::crs::CrsTransformer;
use crate::error::{DataError, DataResult};
use crate::label_source::LabelSourceConfig;
use crate::label_store::LabelStoreConfig;
use crate::pipeline::PipelineContext;
use crate::raster_source::RasterSourceConfig;
use crate::scene::Scene;
use crate::vector_source::{features_to_pixel, read_feature_collection};

const AOI_GEOMETRIES: &str = "aoi_geometries";

/// Config for one scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type_hint", rename = "scene", deny_unknown_fields)]
pub struct SceneConfig {
    pub id: String,
    pub raster_source: RasterSourceConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_source: Option<LabelSourceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_store: Option<LabelStoreConfig>,
    /// GeoJSON files of EPSG:4326 polygons assumed fully labeled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aoi_uris: Option<Vec<String>>,
}

impl SceneConfig {
    #[must_use]
    pub fn new(id: impl Into<String>, raster_source: RasterSourceConfig) -> Self {
        Self {
            id: id.into(),
            raster_source,
            label_source: None,
            label_store: None,
            aoi_uris: None,
        }
    }

    #[must_use]
    pub fn with_label_source(mut self, label_source: LabelSourceConfig) -> Self {
        self.label_source = Some(label_source);
        self
    }

    #[must_use]
    pub fn with_label_store(mut self, label_store: LabelStoreConfig) -> Self {
        self.label_store = Some(label_store);
        self
    }

    #[must_use]
    pub fn with_aoi_uris<S: Into<String>>(mut self, uris: impl IntoIterator<Item = S>) -> Self {
        self.aoi_uris = Some(uris.into_iter().map(Into::into).collect());
        self
    }

    /// Build the runtime scene
    ///
    /// AOI polygons keep the order of `aoi_uris`, then file order.
    ///
    /// # Errors
    /// Returns the first error of any component; nothing is built partially
    pub fn build(&self, class_config: &ClassConfig, tmp_dir: &Path, use_transformers: bool) -> DataResult<Scene> {
        let raster_source = self.raster_source.build(tmp_dir, use_transformers)?;
        let crs_transformer = raster_source.crs_transformer();
        let extent = raster_source.extent();

        let label_source = self
            .label_source
            .as_ref()
            .map(|ls| ls.build(class_config, crs_transformer.clone(), extent, tmp_dir))
            .transpose()?;

        let label_store = self
            .label_store
            .as_ref()
            .map(|ls| ls.build(class_config, crs_transformer.clone(), extent, tmp_dir))
            .transpose()?;

        let mut aoi_polygons = Vec::new();
        for uri in self.aoi_uris.iter().flatten() {
            aoi_polygons.extend(read_aoi_polygons(uri, crs_transformer.as_ref())?);
        }

        tracing::info!("Built scene {} with {} AOI polygons", self.id, aoi_polygons.len());
        Ok(Scene::new(self.id.clone(), raster_source, label_source, label_store, aoi_polygons))
    }

    /// Normalize against a pipeline
    ///
    /// Installs the pipeline's default label store when none is set and lets
    /// each component fill pipeline-derived fields. Updating twice with the
    /// same pipeline yields the same config.
    ///
    /// # Errors
    /// Returns [`ConfigError::Validation`] if the config is invalid
    pub fn update(self, pipeline: Option<&dyn PipelineContext>) -> DataResult<Self> {
        self.validate()?;

        let raster_source = self.raster_source.update(pipeline, &self);
        let label_source = self.label_source.as_ref().map(|ls| ls.update(pipeline, &self));
        let label_store = self
            .label_store
            .clone()
            .or_else(|| pipeline.map(|p| p.get_default_label_store(&self)))
            .map(|ls| ls.update(pipeline, &self));

        Ok(Self {
            raster_source,
            label_source,
            label_store,
            ..self
        })
    }
}

impl Config for SceneConfig {
    const TYPE_HINT: &'static str = "scene";
    const VERSION: u32 = 5;

    fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::validation(Self::TYPE_HINT, "id must not be empty"));
        }
        if let Some(i) = self.aoi_uris.iter().flatten().position(|uri| uri.trim().is_empty()) {
            return Err(ConfigError::validation(
                Self::TYPE_HINT,
                format!("aoi_uris[{i}] must not be empty"),
            ));
        }
        Ok(())
    }
}

/// Upgrades `scene` mappings one version
///
/// At 4 -> 5 `aoi_geometries` is removed. A null value is dropped; inline
/// geometries cannot be migrated automatically.
///
/// # Errors
/// Returns [`ConfigError::Deprecated`] if `aoi_geometries` holds geometries
pub fn scene_config_upgrader(mut dict: ConfigDict, version: u32) -> Result<ConfigDict, ConfigError> {
    if version == 4 {
        match dict.remove(AOI_GEOMETRIES) {
            None | Some(JsonValue::Null) => {}
            Some(_) => {
                return Err(ConfigError::deprecated(
                    AOI_GEOMETRIES,
                    "Write the geometries to GeoJSON files and list them in aoi_uris instead.",
                ))
            }
        }
    }
    Ok(dict)
}

/// Read AOI polygons from a GeoJSON file, in pixel coordinates
///
/// Any `crs` member is ignored. MultiPolygons and GeometryCollections are
/// exploded.
///
/// # Errors
/// Returns [`DataError::NonPolygonAoi`] for non-areal geometries, or any read error
pub fn read_aoi_polygons(uri: &str, crs_transformer: &dyn CrsTransformer) -> DataResult<Vec<Polygon<f64>>> {
    let features = read_feature_collection(uri, true)?;
    let features = features_to_pixel(uri, features, crs_transformer)?;

    let mut polygons = Vec::new();
    for geometry in features.features.into_iter().filter_map(|f| f.geometry) {
        let geom = Geometry::<f64>::try_from(&geometry.value).map_err(|e| DataError::invalid_geojson(uri, e))?;
        collect_polygons(uri, geom, &mut polygons)?;
    }
    Ok(polygons)
}

fn collect_polygons(uri: &str, geom: Geometry<f64>, out: &mut Vec<Polygon<f64>>) -> DataResult<()> {
    match geom {
        Geometry::Polygon(polygon) => out.push(polygon),
        Geometry::MultiPolygon(multi) => out.extend(multi.0),
        Geometry::Rect(rect) => out.push(rect.to_polygon()),
        Geometry::Triangle(triangle) => out.push(triangle.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            for g in collection.0 {
                collect_polygons(uri, g, out)?;
            }
        }
        other => {
            return Err(DataError::NonPolygonAoi {
                uri: uri.to_string(),
                geom_type: geometry_name(&other).to_string(),
            })
        }
    }
    Ok(())
}

fn geometry_name(geom: &Geometry<f64>) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
