use crate::raster::RasterBand;

/// Slope and aspect, in degrees, from a generalized Horn kernel whose
/// half-width `k` grows with the caller's slope scale length (spec §4.4).
/// `count` is the number of non-centre, non-nodata neighbours that
/// contributed; it is `0` (with `slope_degrees`/`aspect_degrees` both `NaN`)
/// when neither axis could form a weighted sum at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivatives {
    pub count: u64,
    pub slope_degrees: f64,
    pub aspect_degrees: f64,
}

/// Computes slope/aspect at `(col, row)` using a `(2k+1)x(2k+1)` Horn window,
/// where `k = max(1, round(scale_length_m / dx / 2))` once `scale_length_m`
/// exceeds the pixel width, else `k = 1`. Individual nodata neighbours are
/// skipped rather than failing the whole sample: each contributes neither to
/// the slope numerator nor to its axis weight.
pub fn slope_aspect(band: &RasterBand, col: i64, row: i64, scale_length_m: f64) -> Derivatives {
    let dx = band.transform.cell_size_x().abs();
    let dy = band.transform.cell_size_y().abs();

    let k = if scale_length_m > dx { ((scale_length_m / dx / 2.0).round() as i64).max(1) } else { 1 };

    let z = |dc: i64, dr: i64| -> Option<f64> {
        let v = band.value_at_cell(col + dc, row + dr)?;
        if band.is_nodata(v) { None } else { Some(v) }
    };

    let mut num_x = 0.0;
    let mut num_y = 0.0;
    let mut weight_x = 0.0;
    let mut weight_y = 0.0;
    let mut count = 0u64;

    for dr in -k..=k {
        for dc in -k..=k {
            if dr == 0 && dc == 0 {
                continue;
            }
            let Some(value) = z(dc, dr) else { continue };

            let weight = if dr == 0 || dc == 0 { 2.0 } else { 1.0 };
            num_x += weight * value * dc as f64;
            num_y += weight * value * dr as f64;
            weight_x += weight * dc.unsigned_abs() as f64;
            weight_y += weight * dr.unsigned_abs() as f64;
            count += 1;
        }
    }

    if weight_x == 0.0 || weight_y == 0.0 {
        return Derivatives { count: 0, slope_degrees: f64::NAN, aspect_degrees: f64::NAN };
    }

    let dz_dx = num_x / (weight_x * dx * k as f64);
    let dz_dy = num_y / (weight_y * dy * k as f64);

    let slope_radians = (dz_dx.powi(2) + dz_dy.powi(2)).sqrt().atan();
    let slope_degrees = slope_radians.to_degrees();

    let aspect_degrees = if slope_radians.abs() < 1e-12 {
        0.0
    } else {
        let mut a = dz_dy.atan2(-dz_dx).to_degrees();
        if a < 0.0 {
            a += 360.0;
        }
        a
    };

    Derivatives { count, slope_degrees, aspect_degrees }
}
