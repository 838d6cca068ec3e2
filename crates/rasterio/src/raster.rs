use std::fs::File;
use std::io::{BufReader, Read, Seek};

use log::debug;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::error::{Error, Result};
use crate::geotransform::GeoTransform;

/// A single-band raster fully decoded into memory, with its affine transform
/// and the coordinate reference system it was encoded in (an EPSG code, or
/// `None` when the source carries no CRS tag).
pub struct RasterBand {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f64>,
    pub nodata: Option<f64>,
    pub transform: GeoTransform,
    pub epsg: Option<u32>,
}

impl RasterBand {
    pub fn value_at_cell(&self, col: i64, row: i64) -> Option<f64> {
        if col < 0 || row < 0 || col as usize >= self.width || row as usize >= self.height {
            return None;
        }
        Some(self.data[row as usize * self.width + col as usize])
    }

    pub fn is_nodata(&self, value: f64) -> bool {
        match self.nodata {
            Some(nodata) => value == nodata || value.is_nan() && nodata.is_nan(),
            None => false,
        }
    }
}

/// Strategy for producing a `RasterBand`: either read a GeoTIFF from disk, or
/// (for injected test/NISAR-style sources) hand the data over directly. Kept
/// as an enum rather than `dyn Trait` since the set of raster origins is
/// closed and known at compile time.
pub enum RasterSourceStrategy {
    GeoTiffFile(String),
    InMemory(RasterBand),
}

impl RasterSourceStrategy {
    pub fn load(self) -> Result<RasterBand> {
        match self {
            RasterSourceStrategy::GeoTiffFile(path) => read_geotiff(&path),
            RasterSourceStrategy::InMemory(band) => Ok(band),
        }
    }
}

fn read_geotiff(path: &str) -> Result<RasterBand> {
    let file = File::open(path).map_err(|e| Error::OpenFailed {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| Error::OpenFailed {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    let (width, height) = decoder.dimensions().map_err(|e| Error::ReadFailed {
        path: path.to_string(),
        reason: e.to_string(),
        retryable: false,
    })?;

    let transform = read_geotransform(&mut decoder, path);
    let nodata = read_nodata(&mut decoder);
    let epsg = read_epsg(&mut decoder);

    let image = decoder.read_image().map_err(|e| Error::ReadFailed {
        path: path.to_string(),
        reason: e.to_string(),
        retryable: false,
    })?;

    let data = decode_samples(image);

    debug!("decoded GeoTIFF {path}: {width}x{height}, epsg={epsg:?}, nodata={nodata:?}");

    Ok(RasterBand {
        width: width as usize,
        height: height as usize,
        data,
        nodata,
        transform,
        epsg,
    })
}

fn decode_samples(result: DecodingResult) -> Vec<f64> {
    match result {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
    }
}

fn read_pixel_scale<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<(f64, f64)> {
    let values = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    if values.len() < 2 {
        return None;
    }
    Some((values[0], values[1]))
}

fn read_tie_points<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<[f64; 6]> {
    let values = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;
    if values.len() != 6 {
        return None;
    }
    let mut tie_points = [0.0; 6];
    tie_points.copy_from_slice(&values[0..6]);
    Some(tie_points)
}

fn read_model_transformation<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<[f64; 8]> {
    let values = decoder.get_tag_f64_vec(Tag::ModelTransformationTag).ok()?;
    if values.len() < 8 {
        return None;
    }
    let mut transform = [0.0; 8];
    transform.copy_from_slice(&values[0..8]);
    Some(transform)
}

/// Reads the GeoTIFF `ModelPixelScale`/`ModelTransformation`/`ModelTiepoint`
/// tags directly through `tiff`'s tag API, mirroring how the upstream
/// GeoTIFF reader decodes georeferencing (spec §4.4). Falls back to an
/// identity transform when the file carries none of them.
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>, path: &str) -> GeoTransform {
    let mut coefficients = [0.0; 6];
    let mut valid = false;

    if let Some((scale_x, scale_y)) = read_pixel_scale(decoder) {
        coefficients[1] = scale_x;
        coefficients[5] = -scale_y;
    }

    if let Some(transform) = read_model_transformation(decoder) {
        coefficients[0] = transform[3];
        coefficients[1] = transform[0];
        coefficients[2] = transform[1];
        coefficients[3] = transform[7];
        coefficients[4] = transform[4];
        coefficients[5] = transform[5];
        valid = true;
    }

    if let Some(tie_points) = read_tie_points(decoder) {
        if coefficients[1] != 0.0 && coefficients[5] != 0.0 {
            coefficients[0] = tie_points[3] - tie_points[0] * coefficients[1];
            coefficients[3] = tie_points[4] - tie_points[1] * coefficients[5];
            valid = true;
        }
    }

    if !valid {
        debug!("no georeferencing tags read for {path}, defaulting to identity transform");
        return GeoTransform::from_top_left_and_cell_size(0.0, 0.0, 1.0, -1.0);
    }

    GeoTransform::new(coefficients)
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?.trim().parse::<f64>().ok()
}

/// Reads the EPSG code out of the `GeoKeyDirectoryTag`'s inline-stored
/// `ProjectedCSTypeGeoKey`/`GeographicTypeGeoKey` entries, preferring the
/// projected CRS when both are present.
fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let key_dir = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    if key_dir.len() < 4 {
        return None;
    }

    let mut geographic = None;
    let mut projected = None;
    for key in key_dir[4..].chunks_exact(4) {
        match key[0] {
            2048 if key[1] == 0 && key[2] == 1 => geographic = Some(key[3] as u32),
            3072 if key[1] == 0 && key[2] == 1 => projected = Some(key[3] as u32),
            _ => {}
        }
    }
    projected.or(geographic)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(width: usize, height: usize, nodata: Option<f64>) -> RasterBand {
        RasterBand {
            width,
            height,
            data: vec![0.0; width * height],
            nodata,
            transform: GeoTransform::from_top_left_and_cell_size(0.0, 0.0, 1.0, -1.0),
            epsg: Some(4326),
        }
    }

    #[test]
    fn value_at_cell_returns_none_outside_extent() {
        let b = band(3, 3, None);
        assert!(b.value_at_cell(-1, 0).is_none());
        assert!(b.value_at_cell(3, 0).is_none());
        assert!(b.value_at_cell(0, 3).is_none());
    }

    #[test]
    fn is_nodata_matches_declared_sentinel() {
        let b = band(1, 1, Some(-9999.0));
        assert!(b.is_nodata(-9999.0));
        assert!(!b.is_nodata(1.0));
    }
}
