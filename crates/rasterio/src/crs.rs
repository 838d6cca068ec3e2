use proj4rs::{transform::transform, Proj};

use crate::error::{Error, Result};

/// Reprojects a single (x, y) point from `source_epsg` into `target_epsg`.
/// Geographic CRSes are expressed to `proj4rs` in radians; this wraps the
/// degrees-in/degrees-out convention the raster sampler's points use.
pub fn reproject_point(x: f64, y: f64, source_epsg: u32, target_epsg: u32) -> Result<(f64, f64)> {
    if source_epsg == target_epsg {
        return Ok((x, y));
    }

    let from = Proj::from_epsg_code(source_epsg).map_err(|e| Error::TransformFailed { reason: e.to_string() })?;
    let to = Proj::from_epsg_code(target_epsg).map_err(|e| Error::TransformFailed { reason: e.to_string() })?;

    let mut point = if from.is_latlong() { (x.to_radians(), y.to_radians(), 0.0) } else { (x, y, 0.0) };

    transform(&from, &to, &mut point).map_err(|e| Error::TransformFailed { reason: e.to_string() })?;

    if to.is_latlong() {
        Ok((point.0.to_degrees(), point.1.to_degrees()))
    } else {
        Ok((point.0, point.1))
    }
}
