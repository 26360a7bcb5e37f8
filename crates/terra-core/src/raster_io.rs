//! GeoTIFF reading and writing
//!
//! Thin layer over the `tiff` crate that understands the GeoTIFF tags needed
//! to build a CRS transformer:
//! - ModelPixelScale + ModelTiepoint, or ModelTransformation
//! - GeoKeyDirectory (EPSG code of the geographic or projected CRS)

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use crate::crs::{GeoTransform, Georeference, Projection, EPSG_WGS84};
use crate::error::{DataError, DataResult};

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Dimensions and georeferencing of a GeoTIFF
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMetadata {
    pub width: u32,
    pub height: u32,
    pub bands: usize,
    pub georeference: Option<Georeference>,
}

/// Decoded pixels, band-interleaved by pixel, as `f32`
#[derive(Debug, Clone, PartialEq)]
pub struct RasterData {
    pub width: u32,
    pub height: u32,
    pub bands: usize,
    pub values: Vec<f32>,
}

impl RasterData {
    /// Value of `band` at (`row`, `col`)
    #[inline]
    #[must_use]
    pub fn get(&self, row: u32, col: u32, band: usize) -> f32 {
        let pixel = row as usize * self.width as usize + col as usize;
        self.values[pixel * self.bands + band]
    }
}

fn open(path: &Path) -> DataResult<Decoder<BufReader<File>>> {
    let file = File::open(path).map_err(|e| DataError::io_error(path, e))?;
    Decoder::new(BufReader::new(file)).map_err(|e| DataError::raster(path.display().to_string(), e))
}

/// Read dimensions and georeferencing without decoding pixels
///
/// # Errors
/// Returns error if the file is not a readable TIFF or uses an unsupported CRS
pub fn read_metadata(path: &Path) -> DataResult<RasterMetadata> {
    let uri = path.display().to_string();
    let mut decoder = open(path)?;
    let (width, height) = decoder.dimensions().map_err(|e| DataError::raster(&uri, e))?;
    let bands = decoder
        .find_tag_unsigned::<u16>(Tag::SamplesPerPixel)
        .map_err(|e| DataError::raster(&uri, e))?
        .map_or(1, usize::from);

    let transform = read_transform(&mut decoder).map_err(|e| DataError::raster(&uri, e))?;
    let georeference = match transform {
        Some(transform) => {
            let keys = decoder
                .find_tag_unsigned_vec::<u16>(Tag::GeoKeyDirectoryTag)
                .map_err(|e| DataError::raster(&uri, e))?;
            let projection = projection_from_geokeys(keys.as_deref())?;
            Some(Georeference {
                transform,
                projection,
            })
        }
        None => None,
    };

    Ok(RasterMetadata {
        width,
        height,
        bands,
        georeference,
    })
}

fn read_transform(decoder: &mut Decoder<BufReader<File>>) -> tiff::TiffResult<Option<GeoTransform>> {
    if let Some(matrix) = decoder.find_tag(Tag::ModelTransformationTag)? {
        let m = matrix.into_f64_vec()?;
        if m.len() >= 8 {
            return Ok(Some(GeoTransform {
                origin_x: m[3],
                pixel_width: m[0],
                row_rotation: m[1],
                origin_y: m[7],
                col_rotation: m[4],
                pixel_height: m[5],
            }));
        }
    }

    let scale = decoder.find_tag(Tag::ModelPixelScaleTag)?;
    let tiepoint = decoder.find_tag(Tag::ModelTiepointTag)?;
    match (scale, tiepoint) {
        (Some(scale), Some(tiepoint)) => {
            let scale = scale.into_f64_vec()?;
            let tie = tiepoint.into_f64_vec()?;
            if scale.len() < 2 || tie.len() < 6 {
                return Ok(None);
            }
            // Tiepoint maps raster (I, J) to model (X, Y)
            Ok(Some(GeoTransform::north_up(
                tie[3] - tie[0] * scale[0],
                tie[4] + tie[1] * scale[1],
                scale[0],
                scale[1],
            )))
        }
        _ => Ok(None),
    }
}

fn projection_from_geokeys(keys: Option<&[u16]>) -> DataResult<Projection> {
    let Some(keys) = keys else {
        tracing::warn!("GeoTIFF has no GeoKeyDirectory; assuming EPSG:{}", EPSG_WGS84);
        return Ok(Projection::Geographic);
    };

    let lookup = |key: u16| {
        keys.get(4..)
            .unwrap_or_default()
            .chunks_exact(4)
            .find(|entry| entry[0] == key && entry[1] == 0)
            .map(|entry| entry[3])
    };

    let code = lookup(PROJECTED_CS_TYPE_KEY)
        .or_else(|| lookup(GEOGRAPHIC_TYPE_KEY))
        .unwrap_or(EPSG_WGS84);
    Projection::from_epsg(code).ok_or(DataError::UnsupportedCrs(code))
}

fn geokeys(projection: Projection) -> Vec<u16> {
    let (model_type, crs_key) = match projection {
        Projection::Geographic => (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_KEY),
        Projection::WebMercator => (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_KEY),
    };
    vec![
        1, 1, 0, 3,
        GT_MODEL_TYPE_KEY, 0, 1, model_type,
        GT_RASTER_TYPE_KEY, 0, 1, RASTER_PIXEL_IS_AREA,
        crs_key, 0, 1, projection.epsg(),
    ]
}

/// Decode all pixels
///
/// # Errors
/// Returns error if decoding fails or the sample format is unsupported
pub fn read_data(path: &Path) -> DataResult<RasterData> {
    let uri = path.display().to_string();
    let mut decoder = open(path)?;
    let (width, height) = decoder.dimensions().map_err(|e| DataError::raster(&uri, e))?;
    let decoded = decoder.read_image().map_err(|e| DataError::raster(&uri, e))?;

    let values: Vec<f32> = match decoded {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        #[allow(unreachable_patterns)]
        _ => return Err(DataError::raster(&uri, "unsupported sample format")),
    };

    let pixels = width as usize * height as usize;
    if pixels == 0 || values.len() % pixels != 0 {
        return Err(DataError::raster(&uri, "sample count does not match dimensions"));
    }

    Ok(RasterData {
        width,
        height,
        bands: values.len() / pixels,
        values,
    })
}

/// Write an 8-bit GeoTIFF with one (gray) or three (RGB) bands
///
/// # Errors
/// Returns error if the band count is unsupported, `data` does not match
/// the dimensions, or writing fails
pub fn write_u8(
    path: &Path,
    width: u32,
    height: u32,
    bands: usize,
    data: &[u8],
    georeference: Option<&Georeference>,
) -> DataResult<()> {
    let uri = path.display().to_string();
    if data.len() != width as usize * height as usize * bands {
        return Err(DataError::raster(&uri, "data length does not match dimensions"));
    }

    let file = File::create(path).map_err(|e| DataError::io_error(path, e))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(|e| DataError::raster(&uri, e))?;

    match bands {
        1 => {
            let mut image = encoder
                .new_image::<colortype::Gray8>(width, height)
                .map_err(|e| DataError::raster(&uri, e))?;
            if let Some(georeference) = georeference {
                write_geotags(image.encoder(), georeference).map_err(|e| DataError::raster(&uri, e))?;
            }
            image.write_data(data).map_err(|e| DataError::raster(&uri, e))
        }
        3 => {
            let mut image = encoder
                .new_image::<colortype::RGB8>(width, height)
                .map_err(|e| DataError::raster(&uri, e))?;
            if let Some(georeference) = georeference {
                write_geotags(image.encoder(), georeference).map_err(|e| DataError::raster(&uri, e))?;
            }
            image.write_data(data).map_err(|e| DataError::raster(&uri, e))
        }
        n => Err(DataError::raster(&uri, format!("cannot write {n} bands"))),
    }
}

fn write_geotags<W, K>(
    dir: &mut tiff::encoder::DirectoryEncoder<'_, W, K>,
    georeference: &Georeference,
) -> tiff::TiffResult<()>
where
    W: std::io::Write + std::io::Seek,
    K: tiff::encoder::TiffKind,
{
    let t = &georeference.transform;
    if t.is_north_up() {
        let scale = [t.pixel_width, -t.pixel_height, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0];
        dir.write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
        dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
    } else {
        let matrix = [
            t.pixel_width, t.row_rotation, 0.0, t.origin_x,
            t.col_rotation, t.pixel_height, 0.0, t.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(Tag::ModelTransformationTag, &matrix[..])?;
    }
    dir.write_tag(Tag::GeoKeyDirectoryTag, &geokeys(georeference.projection)[..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn georeference(projection: Projection) -> Georeference {
        Georeference {
            transform: GeoTransform::north_up(10.0, 50.0, 0.001, 0.001),
            projection,
        }
    }

    #[test]
    fn write_then_read_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.tif");
        let georef = georeference(Projection::Geographic);

        write_u8(&path, 4, 3, 1, &[7; 12], Some(&georef)).unwrap();
        let meta = read_metadata(&path).unwrap();

        assert_eq!((meta.width, meta.height, meta.bands), (4, 3, 1));
        assert_eq!(meta.georeference, Some(georef));
    }

    #[test]
    fn rotated_transform_uses_matrix_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotated.tif");
        let georef = Georeference {
            transform: GeoTransform {
                origin_x: 1000.0,
                pixel_width: 10.0,
                row_rotation: 1.0,
                origin_y: 5000.0,
                col_rotation: 2.0,
                pixel_height: -10.0,
            },
            projection: Projection::WebMercator,
        };

        write_u8(&path, 2, 2, 1, &[0; 4], Some(&georef)).unwrap();
        assert_eq!(read_metadata(&path).unwrap().georeference, Some(georef));
    }

    #[test]
    fn read_rgb_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        let data: Vec<u8> = (0..12).collect();

        write_u8(&path, 2, 2, 3, &data, None).unwrap();
        let raster = read_data(&path).unwrap();

        assert_eq!(raster.bands, 3);
        assert_eq!(read_metadata(&path).unwrap().bands, 3);
        assert_eq!(raster.get(1, 0, 2), 8.0);
        assert!(read_metadata(&path).unwrap().georeference.is_none());
    }

    #[test]
    fn write_rejects_bad_length() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_u8(&dir.path().join("bad.tif"), 2, 2, 1, &[0; 3], None).unwrap_err();
        assert!(matches!(err, DataError::Raster { .. }));
    }

    #[test]
    fn unsupported_epsg() {
        let keys = [1, 1, 0, 1, PROJECTED_CS_TYPE_KEY, 0, 1, 32615];
        assert!(matches!(
            projection_from_geokeys(Some(&keys)),
            Err(DataError::UnsupportedCrs(32615))
        ));
        assert_eq!(projection_from_geokeys(None).unwrap(), Projection::Geographic);
    }
}
