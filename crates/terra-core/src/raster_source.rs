//! Raster sources and raster transformers
//!
//! A [`RasterSourceConfig`] builds a [`RasterSource`]: the extent and CRS
//! transformer are read eagerly, pixels are decoded on the first chip read.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::crs::{AffineCrsTransformer, IdentityCrsTransformer, SharedCrsTransformer};
use crate::error::{DataError, DataResult};
use crate::extent::PixelBox;
use crate::pipeline::PipelineContext;
use crate::raster_io::{self, RasterData};
use crate::scene_config::SceneConfig;
use crate::uri;

/// Pixel values of one window, band-interleaved by pixel
#[derive(Debug, Clone, PartialEq)]
pub struct RasterChip {
    pub height: u32,
    pub width: u32,
    pub channels: usize,
    pub data: Vec<f32>,
}

impl RasterChip {
    #[inline]
    #[must_use]
    pub fn get(&self, row: u32, col: u32, channel: usize) -> f32 {
        let pixel = row as usize * self.width as usize + col as usize;
        self.data[pixel * self.channels + channel]
    }
}

/// Rewrites chip values after they are read
pub trait RasterTransformer: std::fmt::Debug + Send + Sync {
    /// # Errors
    /// Returns error if the chip cannot be transformed
    fn transform(&self, chip: RasterChip) -> DataResult<RasterChip>;
}

/// Maps integer pixel values to new values
///
/// Values without an entry are left unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReclassTransformer {
    #[serde(deserialize_with = "crate::serde_keys::deserialize")]
    pub mapping: BTreeMap<i64, i64>,
}

impl RasterTransformer for ReclassTransformer {
    fn transform(&self, mut chip: RasterChip) -> DataResult<RasterChip> {
        for value in &mut chip.data {
            if value.fract() == 0.0 {
                if let Some(&to) = self.mapping.get(&(*value as i64)) {
                    *value = to as f32;
                }
            }
        }
        Ok(chip)
    }
}

/// Persisted raster transformer variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type_hint")]
pub enum RasterTransformerConfig {
    #[serde(rename = "reclass_transformer")]
    Reclass(ReclassTransformer),
}

impl RasterTransformerConfig {
    pub const TYPE_HINTS: [&'static str; 1] = ["reclass_transformer"];

    #[must_use]
    pub fn build(&self) -> Box<dyn RasterTransformer> {
        match self {
            Self::Reclass(reclass) => Box::new(reclass.clone()),
        }
    }
}

/// GeoTIFF raster source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeoTiffSourceConfig {
    pub uri: String,
    /// Bands to read, in output order; all bands if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_order: Option<Vec<usize>>,
    #[serde(default)]
    pub transformers: Vec<RasterTransformerConfig>,
}

impl GeoTiffSourceConfig {
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            channel_order: None,
            transformers: Vec::new(),
        }
    }
}

/// Persisted raster source variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type_hint")]
pub enum RasterSourceConfig {
    #[serde(rename = "geotiff_source")]
    GeoTiff(GeoTiffSourceConfig),
}

impl RasterSourceConfig {
    pub const TYPE_HINTS: [&'static str; 1] = ["geotiff_source"];

    /// Shorthand for a GeoTIFF source
    #[must_use]
    pub fn geotiff(uri: impl Into<String>) -> Self {
        Self::GeoTiff(GeoTiffSourceConfig::new(uri))
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        match self {
            Self::GeoTiff(cfg) => &cfg.uri,
        }
    }

    /// Normalize against a pipeline; raster sources have no pipeline defaults
    #[must_use]
    pub fn update(&self, _pipeline: Option<&dyn PipelineContext>, _scene: &SceneConfig) -> Self {
        self.clone()
    }

    /// Open the raster and read its metadata
    ///
    /// Only rasters in EPSG:4326 or EPSG:3857 (or without geotags) can be
    /// opened; UTM and other projected CRSs fail with
    /// [`DataError::UnsupportedCrs`]. Reproject them beforehand.
    ///
    /// # Errors
    /// Returns error if the raster cannot be read, uses an unsupported CRS,
    /// or `channel_order` names a missing band
    pub fn build(&self, _tmp_dir: &Path, use_transformers: bool) -> DataResult<RasterSource> {
        match self {
            Self::GeoTiff(cfg) => RasterSource::open(cfg, use_transformers),
        }
    }
}

/// Built raster source
#[derive(Debug)]
pub struct RasterSource {
    uri: String,
    path: PathBuf,
    extent: PixelBox,
    bands: usize,
    channel_order: Option<Vec<usize>>,
    crs_transformer: SharedCrsTransformer,
    transformers: Vec<Box<dyn RasterTransformer>>,
    data: OnceCell<RasterData>,
}

impl RasterSource {
    fn open(cfg: &GeoTiffSourceConfig, use_transformers: bool) -> DataResult<Self> {
        let path = uri::local_path(&cfg.uri)?;
        let metadata = raster_io::read_metadata(&path)?;

        if let Some(order) = &cfg.channel_order {
            if let Some(bad) = order.iter().find(|&&band| band >= metadata.bands) {
                return Err(DataError::raster(
                    &cfg.uri,
                    format!("channel {bad} requested but raster has {} bands", metadata.bands),
                ));
            }
        }

        let crs_transformer: SharedCrsTransformer = match metadata.georeference {
            Some(georeference) => Arc::new(AffineCrsTransformer::from(georeference)),
            None => {
                tracing::warn!("Raster {} has no georeferencing; using pixel coordinates", cfg.uri);
                Arc::new(IdentityCrsTransformer)
            }
        };

        let transformers = if use_transformers {
            cfg.transformers.iter().map(RasterTransformerConfig::build).collect()
        } else {
            Vec::new()
        };

        tracing::debug!(
            "Opened raster {} ({}x{}, {} bands)",
            cfg.uri,
            metadata.width,
            metadata.height,
            metadata.bands
        );

        Ok(Self {
            uri: cfg.uri.clone(),
            path,
            extent: PixelBox::from_size(metadata.height, metadata.width),
            bands: metadata.bands,
            channel_order: cfg.channel_order.clone(),
            crs_transformer,
            transformers,
            data: OnceCell::new(),
        })
    }

    #[inline]
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Full raster window
    #[inline]
    #[must_use]
    pub fn extent(&self) -> PixelBox {
        self.extent
    }

    #[inline]
    #[must_use]
    pub fn crs_transformer(&self) -> SharedCrsTransformer {
        Arc::clone(&self.crs_transformer)
    }

    /// Channels returned by [`RasterSource::get_chip`]
    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.channel_order.as_ref().map_or(self.bands, Vec::len)
    }

    /// Read the pixels of a window
    ///
    /// # Errors
    /// Returns [`DataError::WindowOutOfBounds`] if the window does not fit
    /// the extent, or any decode or transformer error
    pub fn get_chip(&self, window: &PixelBox) -> DataResult<RasterChip> {
        if !self.extent.contains(window) {
            return Err(DataError::WindowOutOfBounds {
                window: window.to_string(),
                extent: self.extent.to_string(),
            });
        }

        let raster = self.data.get_or_try_init(|| raster_io::read_data(&self.path))?;
        let channels: Vec<usize> = match &self.channel_order {
            Some(order) => order.clone(),
            None => (0..raster.bands).collect(),
        };

        let mut data = Vec::with_capacity(window.area() as usize * channels.len());
        for row in window.ymin..window.ymax {
            for col in window.xmin..window.xmax {
                data.extend(channels.iter().map(|&band| raster.get(row, col, band)));
            }
        }

        let chip = RasterChip {
            height: window.height(),
            width: window.width(),
            channels: channels.len(),
            data,
        };
        self.transformers.iter().try_fold(chip, |chip, t| t.transform(chip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::{GeoTransform, Georeference, Projection};
    use pretty_assertions::assert_eq;

    fn write_rgb(dir: &Path) -> String {
        let path = dir.join("rgb.tif");
        let data: Vec<u8> = (0..4 * 3 * 3).map(|v| v as u8).collect();
        let georef = Georeference {
            transform: GeoTransform::north_up(10.0, 50.0, 0.001, 0.001),
            projection: Projection::Geographic,
        };
        raster_io::write_u8(&path, 4, 3, 3, &data, Some(&georef)).unwrap();
        path.display().to_string()
    }

    #[test]
    fn build_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let source = RasterSourceConfig::geotiff(write_rgb(dir.path()))
            .build(dir.path(), true)
            .unwrap();

        assert_eq!(source.extent(), PixelBox::from_size(3, 4));
        assert_eq!(source.num_channels(), 3);
        assert!(source.crs_transformer().georeference().is_some());
    }

    #[test]
    fn chip_respects_channel_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = GeoTiffSourceConfig::new(write_rgb(dir.path()));
        cfg.channel_order = Some(vec![2, 0]);
        let source = RasterSourceConfig::GeoTiff(cfg).build(dir.path(), true).unwrap();

        let chip = source.get_chip(&PixelBox::new(1, 1, 2, 3)).unwrap();
        assert_eq!((chip.height, chip.width, chip.channels), (1, 2, 2));
        // pixel (1, 1) is the 6th pixel: values 15, 16, 17
        assert_eq!(chip.data, vec![17.0, 15.0, 20.0, 18.0]);
    }

    #[test]
    fn bad_channel_order_fails_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = GeoTiffSourceConfig::new(write_rgb(dir.path()));
        cfg.channel_order = Some(vec![3]);
        let err = RasterSourceConfig::GeoTiff(cfg).build(dir.path(), true).unwrap_err();
        assert!(matches!(err, DataError::Raster { .. }));
    }

    #[test]
    fn window_outside_extent() {
        let dir = tempfile::tempdir().unwrap();
        let source = RasterSourceConfig::geotiff(write_rgb(dir.path()))
            .build(dir.path(), true)
            .unwrap();
        let err = source.get_chip(&PixelBox::new(0, 0, 4, 4)).unwrap_err();
        assert!(matches!(err, DataError::WindowOutOfBounds { .. }));
    }

    #[test]
    fn transformers_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = GeoTiffSourceConfig::new(write_rgb(dir.path()));
        cfg.transformers.push(RasterTransformerConfig::Reclass(ReclassTransformer {
            mapping: BTreeMap::from([(0, 99)]),
        }));
        let config = RasterSourceConfig::GeoTiff(cfg);
        let window = PixelBox::new(0, 0, 1, 1);

        let with = config.build(dir.path(), true).unwrap().get_chip(&window).unwrap();
        let without = config.build(dir.path(), false).unwrap().get_chip(&window).unwrap();
        assert_eq!(with.data, vec![99.0, 1.0, 2.0]);
        assert_eq!(without.data, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.tif").display().to_string();
        let err = RasterSourceConfig::geotiff(missing).build(dir.path(), true).unwrap_err();
        assert!(matches!(err, DataError::Io { .. }));
    }

    #[test]
    fn reclass_config_from_json() {
        let config: RasterTransformerConfig = serde_json::from_value(serde_json::json!({
            "type_hint": "reclass_transformer",
            "mapping": {"1": 0, "2": 1},
        }))
        .unwrap();
        let RasterTransformerConfig::Reclass(reclass) = config;
        assert_eq!(reclass.mapping, BTreeMap::from([(1, 0), (2, 1)]));
    }
}
