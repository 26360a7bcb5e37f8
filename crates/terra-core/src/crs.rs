//! Coordinate reference system transformers
//!
//! Converts between map coordinates (EPSG:4326 longitude/latitude) and pixel
//! coordinates (x = column, y = row) of a raster.

use std::f64::consts::FRAC_PI_4;
use std::sync::Arc;

use geo::{Coord, Geometry, MapCoords};

/// EPSG code of WGS84 geographic coordinates
pub const EPSG_WGS84: u16 = 4326;

/// EPSG code of spherical web mercator
pub const EPSG_WEB_MERCATOR: u16 = 3857;

const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Converts between map and pixel coordinates
pub trait CrsTransformer: std::fmt::Debug + Send + Sync {
    /// EPSG:4326 (x = longitude, y = latitude) to pixel (x = column, y = row)
    fn map_to_pixel(&self, coord: Coord<f64>) -> Coord<f64>;

    /// Pixel (x = column, y = row) to EPSG:4326
    fn pixel_to_map(&self, coord: Coord<f64>) -> Coord<f64>;

    /// Georeferencing to write alongside derived rasters
    fn georeference(&self) -> Option<Georeference> {
        None
    }
}

/// Shared handle to a CRS transformer
pub type SharedCrsTransformer = Arc<dyn CrsTransformer>;

/// Reproject a geometry from EPSG:4326 to pixel coordinates
#[must_use]
pub fn geometry_to_pixel(transformer: &dyn CrsTransformer, geometry: &Geometry<f64>) -> Geometry<f64> {
    geometry.map_coords(|c| transformer.map_to_pixel(c))
}

/// Reproject a geometry from pixel coordinates to EPSG:4326
#[must_use]
pub fn geometry_to_map(transformer: &dyn CrsTransformer, geometry: &Geometry<f64>) -> Geometry<f64> {
    geometry.map_coords(|c| transformer.pixel_to_map(c))
}

/// Transformer for rasters without georeferencing
///
/// Map and pixel coordinates coincide.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCrsTransformer;

impl CrsTransformer for IdentityCrsTransformer {
    #[inline]
    fn map_to_pixel(&self, coord: Coord<f64>) -> Coord<f64> {
        coord
    }

    #[inline]
    fn pixel_to_map(&self, coord: Coord<f64>) -> Coord<f64> {
        coord
    }
}

/// Map projection of a raster's native CRS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// EPSG:4326, degrees
    Geographic,
    /// EPSG:3857, meters
    WebMercator,
}

impl Projection {
    /// Look up projection by EPSG code
    #[must_use]
    pub fn from_epsg(code: u16) -> Option<Self> {
        match code {
            EPSG_WGS84 => Some(Self::Geographic),
            EPSG_WEB_MERCATOR => Some(Self::WebMercator),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn epsg(self) -> u16 {
        match self {
            Self::Geographic => EPSG_WGS84,
            Self::WebMercator => EPSG_WEB_MERCATOR,
        }
    }

    /// EPSG:4326 to native coordinates
    #[must_use]
    pub fn project(self, lonlat: Coord<f64>) -> Coord<f64> {
        match self {
            Self::Geographic => lonlat,
            Self::WebMercator => Coord {
                x: EARTH_RADIUS_M * lonlat.x.to_radians(),
                y: EARTH_RADIUS_M * (FRAC_PI_4 + lonlat.y.to_radians() / 2.0).tan().ln(),
            },
        }
    }

    /// Native coordinates to EPSG:4326
    #[must_use]
    pub fn unproject(self, native: Coord<f64>) -> Coord<f64> {
        match self {
            Self::Geographic => native,
            Self::WebMercator => Coord {
                x: (native.x / EARTH_RADIUS_M).to_degrees(),
                y: (2.0 * (native.y / EARTH_RADIUS_M).exp().atan() - 2.0 * FRAC_PI_4).to_degrees(),
            },
        }
    }
}

/// Affine pixel-to-native transform in GDAL order
///
/// `x = origin_x + col * pixel_width + row * row_rotation`
/// `y = origin_y + col * col_rotation + row * pixel_height`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform without rotation
    #[inline]
    #[must_use]
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_rotation: 0.0,
            origin_y,
            col_rotation: 0.0,
            pixel_height: -pixel_height.abs(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0
    }

    fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }

    /// Pixel to native coordinates
    #[must_use]
    pub fn apply(&self, pixel: Coord<f64>) -> Coord<f64> {
        Coord {
            x: self.origin_x + pixel.x * self.pixel_width + pixel.y * self.row_rotation,
            y: self.origin_y + pixel.x * self.col_rotation + pixel.y * self.pixel_height,
        }
    }

    /// Native to pixel coordinates
    #[must_use]
    pub fn invert(&self, native: Coord<f64>) -> Coord<f64> {
        let det = self.determinant();
        let dx = native.x - self.origin_x;
        let dy = native.y - self.origin_y;
        Coord {
            x: (self.pixel_height * dx - self.row_rotation * dy) / det,
            y: (self.pixel_width * dy - self.col_rotation * dx) / det,
        }
    }
}

/// Affine transform plus the native projection it is expressed in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Georeference {
    pub transform: GeoTransform,
    pub projection: Projection,
}

/// Transformer for georeferenced rasters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineCrsTransformer {
    georeference: Georeference,
}

impl AffineCrsTransformer {
    #[inline]
    #[must_use]
    pub fn new(transform: GeoTransform, projection: Projection) -> Self {
        Self {
            georeference: Georeference {
                transform,
                projection,
            },
        }
    }

    #[inline]
    #[must_use]
    pub fn transform(&self) -> &GeoTransform {
        &self.georeference.transform
    }

    #[inline]
    #[must_use]
    pub fn projection(&self) -> Projection {
        self.georeference.projection
    }
}

impl From<Georeference> for AffineCrsTransformer {
    fn from(georeference: Georeference) -> Self {
        Self { georeference }
    }
}

impl CrsTransformer for AffineCrsTransformer {
    fn map_to_pixel(&self, coord: Coord<f64>) -> Coord<f64> {
        let native = self.georeference.projection.project(coord);
        self.georeference.transform.invert(native)
    }

    fn pixel_to_map(&self, coord: Coord<f64>) -> Coord<f64> {
        let native = self.georeference.transform.apply(coord);
        self.georeference.projection.unproject(native)
    }

    fn georeference(&self) -> Option<Georeference> {
        Some(self.georeference)
    }
}
