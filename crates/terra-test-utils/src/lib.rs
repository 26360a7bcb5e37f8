//! Testing utilities for Terra workspace
//!
//! Shared fixtures: GeoTIFF and GeoJSON writers, a mock pipeline, and
//! scene-config builders.

#![allow(missing_docs)]

use std::path::Path;

use serde_json::{json, Value};
use terra_config::ConfigDict;
use terra_core::raster_io;
use terra_core::{
    CrsTransformer, GeoTransform, Georeference, LabelStoreConfig, PipelineContext, PixelBox, Projection,
    RasterSourceConfig, SceneConfig,
};

/// North-up EPSG:4326 georeference with 0.001 degree pixels at (10, 50)
pub fn test_georeference() -> Georeference {
    Georeference {
        transform: GeoTransform::north_up(10.0, 50.0, 0.001, 0.001),
        projection: Projection::Geographic,
    }
}

pub fn unique_scene_id() -> String {
    format!("scene-{}", uuid::Uuid::new_v4().simple())
}

/// Write a georeferenced 8-bit raster whose values count up from 0
pub fn write_test_raster(dir: &Path, name: &str, width: u32, height: u32, bands: usize) -> String {
    let path = dir.join(name);
    let len = width as usize * height as usize * bands;
    let data: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
    raster_io::write_u8(&path, width, height, bands, &data, Some(&test_georeference())).unwrap();
    path.display().to_string()
}

/// Write a georeferenced single-band raster of class ids
pub fn write_class_raster(dir: &Path, name: &str, width: u32, height: u32, class_ids: &[u8]) -> String {
    let path = dir.join(name);
    raster_io::write_u8(&path, width, height, 1, class_ids, Some(&test_georeference())).unwrap();
    path.display().to_string()
}

/// GeoJSON polygon covering a pixel window of a [`test_georeference`] raster
pub fn window_geometry(window: &PixelBox) -> Value {
    let crs = terra_core::AffineCrsTransformer::from(test_georeference());
    let ring: Vec<Value> = window
        .to_polygon()
        .exterior()
        .coords()
        .map(|&c| {
            let lonlat = crs.pixel_to_map(c);
            json!([lonlat.x, lonlat.y])
        })
        .collect();
    json!({"type": "Polygon", "coordinates": [ring]})
}

pub fn feature(geometry: Value, properties: Value) -> Value {
    json!({"type": "Feature", "geometry": geometry, "properties": properties})
}

pub fn write_features(dir: &Path, name: &str, features: Vec<Value>) -> String {
    let path = dir.join(name);
    let fc = json!({"type": "FeatureCollection", "features": features});
    std::fs::write(&path, fc.to_string()).unwrap();
    path.display().to_string()
}

/// Write one polygon feature per pixel window
pub fn write_polygons_geojson(dir: &Path, name: &str, windows: &[PixelBox]) -> String {
    let features = windows
        .iter()
        .map(|w| feature(window_geometry(w), json!({})))
        .collect();
    write_features(dir, name, features)
}

pub fn scene_config(id: &str, raster_uri: &str) -> SceneConfig {
    SceneConfig::new(id, RasterSourceConfig::geotiff(raster_uri))
}

pub fn to_dict(value: Value) -> ConfigDict {
    match value {
        Value::Object(dict) => dict,
        other => panic!("expected a mapping, got {other}"),
    }
}

/// Pipeline with a fixed prediction directory and default store
#[derive(Debug, Clone)]
pub struct MockPipeline {
    pub predict_uri: String,
    pub default_store: LabelStoreConfig,
}

impl MockPipeline {
    pub fn new(predict_uri: impl Into<String>) -> Self {
        Self {
            predict_uri: predict_uri.into(),
            default_store: LabelStoreConfig::semantic_segmentation(None),
        }
    }

    pub fn with_default_store(mut self, store: LabelStoreConfig) -> Self {
        self.default_store = store;
        self
    }
}

impl PipelineContext for MockPipeline {
    fn get_default_label_store(&self, _scene: &SceneConfig) -> LabelStoreConfig {
        self.default_store.clone()
    }

    fn predict_uri(&self) -> Option<String> {
        Some(self.predict_uri.clone())
    }
}
