//! Built scenes

use geo::{Contains, Polygon};

use crate::extent::PixelBox;
use crate::label_source::LabelSource;
use crate::label_store::LabelStore;
use crate::raster_source::RasterSource;

/// Imagery plus optional ground truth and prediction destination,
/// restricted to areas of interest in pixel coordinates
#[derive(Debug)]
pub struct Scene {
    id: String,
    raster_source: RasterSource,
    label_source: Option<LabelSource>,
    label_store: Option<LabelStore>,
    aoi_polygons: Vec<Polygon<f64>>,
}

impl Scene {
    #[must_use]
    pub fn new(
        id: String,
        raster_source: RasterSource,
        label_source: Option<LabelSource>,
        label_store: Option<LabelStore>,
        aoi_polygons: Vec<Polygon<f64>>,
    ) -> Self {
        Self {
            id,
            raster_source,
            label_source,
            label_store,
            aoi_polygons,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn raster_source(&self) -> &RasterSource {
        &self.raster_source
    }

    #[inline]
    #[must_use]
    pub fn label_source(&self) -> Option<&LabelSource> {
        self.label_source.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn label_store(&self) -> Option<&LabelStore> {
        self.label_store.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn aoi_polygons(&self) -> &[Polygon<f64>] {
        &self.aoi_polygons
    }

    #[inline]
    #[must_use]
    pub fn extent(&self) -> PixelBox {
        self.raster_source.extent()
    }

    /// Whether a chip window may be sampled
    ///
    /// Without AOIs the whole extent qualifies; otherwise the window must lie
    /// inside a single AOI polygon.
    #[must_use]
    pub fn window_in_aoi(&self, window: &PixelBox) -> bool {
        if self.aoi_polygons.is_empty() {
            return self.extent().contains(window);
        }
        let window = window.to_polygon();
        self.aoi_polygons.iter().any(|aoi| aoi.contains(&window))
    }
}
