//! Error types for the data layer
//!
//! Errors raised while building raster sources, vector sources, label
//! sources, label stores and scenes. Every nested build error reaches the
//! caller unchanged.

use std::path::PathBuf;

use terra_config::ConfigError;

/// Errors raised while building or reading geospatial data
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// Config could not be loaded, upgraded or validated
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO error on a local file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// URI scheme this layer cannot read
    #[error("unsupported URI '{0}': only local paths and file:// URIs are supported")]
    UnsupportedUri(String),

    /// GeoJSON could not be parsed or converted
    #[error("invalid GeoJSON in {uri}: {message}")]
    InvalidGeoJson { uri: String, message: String },

    /// GeoJSON declares a CRS other than EPSG:4326
    #[error("GeoJSON in {uri} declares CRS '{crs}', expected EPSG:4326")]
    UnexpectedCrs { uri: String, crs: String },

    /// Raster could not be decoded or written
    #[error("raster error in {uri}: {message}")]
    Raster { uri: String, message: String },

    /// Raster is georeferenced in a CRS without a transformer
    #[error("unsupported raster CRS: EPSG:{0}")]
    UnsupportedCrs(u16),

    /// Window does not fit inside the raster extent
    #[error("window {window} lies outside extent {extent}")]
    WindowOutOfBounds { window: String, extent: String },

    /// AOI file contains a geometry that is not areal
    #[error("AOI in {uri} contains a {geom_type}; only Polygon and MultiPolygon are allowed")]
    NonPolygonAoi { uri: String, geom_type: String },

    /// Labeled feature without a `class_id` property
    #[error("feature {index} in {uri} has no class_id")]
    MissingClassId { uri: String, index: usize },

    /// Class name or id not present in the class config
    #[error("unknown class '{0}'")]
    UnknownClass(String),

    /// Label store built without a destination
    #[error("label store has no URI; set one or run update() with a pipeline")]
    MissingStoreUri,

    /// Serialization of labels failed
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl DataError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create GeoJSON error for a URI
    pub fn invalid_geojson(uri: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidGeoJson {
            uri: uri.into(),
            message: message.to_string(),
        }
    }

    /// Create raster error for a URI
    pub fn raster(uri: impl Into<String>, message: impl ToString) -> Self {
        Self::Raster {
            uri: uri.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for data operations
pub type DataResult<T> = Result<T, DataError>;
