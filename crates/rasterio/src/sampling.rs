use crate::raster::RasterBand;

/// Resampling kernel used when a requested point falls between cell centers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingAlgorithm {
    NearestNeighbour,
    Bilinear,
    Cubic,
    CubicSpline,
    Lanczos,
    Average,
    Mode,
    Gauss,
}

/// Default window radius (in pixels) per algorithm, per spec §4.4's kernel
/// table. `NearestNeighbour` and `Bilinear` do not scan a radius-sized window.
pub fn default_radius_pixels(algorithm: SamplingAlgorithm) -> i64 {
    match algorithm {
        SamplingAlgorithm::NearestNeighbour | SamplingAlgorithm::Bilinear => 1,
        SamplingAlgorithm::Cubic | SamplingAlgorithm::CubicSpline => 2,
        SamplingAlgorithm::Lanczos | SamplingAlgorithm::Average | SamplingAlgorithm::Mode | SamplingAlgorithm::Gauss => 3,
    }
}

/// Samples `band` at fractional cell coordinates `(col, row)` using `algorithm`.
/// `radius_override`, when set, replaces the algorithm's default window radius
/// (e.g. from a user-supplied sampling radius converted to pixels); it has no
/// effect on `NearestNeighbour`/`Bilinear`, which do not scan a window.
/// Returns `None` when the sampled neighbourhood has no data at all, or the
/// point lies entirely outside the raster.
pub fn sample(band: &RasterBand, col: f64, row: f64, algorithm: SamplingAlgorithm, radius_override: Option<i64>) -> Option<f64> {
    match algorithm {
        SamplingAlgorithm::NearestNeighbour => sample_nearest(band, col, row),
        SamplingAlgorithm::Bilinear => sample_bilinear(band, col, row),
        SamplingAlgorithm::Cubic | SamplingAlgorithm::CubicSpline => convolve(band, col, row, radius_override.unwrap_or(2), cubic_weight),
        SamplingAlgorithm::Lanczos => sample_lanczos(band, col, row, radius_override.unwrap_or(3)),
        SamplingAlgorithm::Average => sample_kernel_mean(band, col, row, radius_override.unwrap_or(3)),
        SamplingAlgorithm::Mode => sample_kernel_mode(band, col, row, radius_override.unwrap_or(3)),
        SamplingAlgorithm::Gauss => sample_gauss(band, col, row, radius_override.unwrap_or(3)),
    }
}

fn valid_value(band: &RasterBand, col: i64, row: i64) -> Option<f64> {
    let v = band.value_at_cell(col, row)?;
    if band.is_nodata(v) { None } else { Some(v) }
}

fn sample_nearest(band: &RasterBand, col: f64, row: f64) -> Option<f64> {
    valid_value(band, col.round() as i64, row.round() as i64)
}

/// Bilinear interpolation over the 4 surrounding cells. A window that would
/// cross the raster edge (or land on a nodata corner) falls back to the
/// nearest-pixel value rather than failing the sample.
fn sample_bilinear(band: &RasterBand, col: f64, row: f64) -> Option<f64> {
    let c0 = col.floor() as i64;
    let r0 = row.floor() as i64;
    let fc = col - c0 as f64;
    let fr = row - r0 as f64;

    let corners = (
        valid_value(band, c0, r0),
        valid_value(band, c0 + 1, r0),
        valid_value(band, c0, r0 + 1),
        valid_value(band, c0 + 1, r0 + 1),
    );

    if let (Some(v00), Some(v10), Some(v01), Some(v11)) = corners {
        let top = v00 * (1.0 - fc) + v10 * fc;
        let bottom = v01 * (1.0 - fc) + v11 * fc;
        return Some(top * (1.0 - fr) + bottom * fr);
    }

    sample_nearest(band, col, row)
}

fn cubic_weight(t: f64) -> f64 {
    let a = -0.5;
    let t = t.abs();
    if t <= 1.0 {
        (a + 2.0) * t.powi(3) - (a + 3.0) * t.powi(2) + 1.0
    } else if t < 2.0 {
        a * t.powi(3) - 5.0 * a * t.powi(2) + 8.0 * a * t - 4.0 * a
    } else {
        0.0
    }
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 { 1.0 } else { (std::f64::consts::PI * x).sin() / (std::f64::consts::PI * x) }
}

fn sample_lanczos(band: &RasterBand, col: f64, row: f64, a: i64) -> Option<f64> {
    convolve(band, col, row, a, move |t| if t.abs() < a as f64 { sinc(t) * sinc(t / a as f64) } else { 0.0 })
}

/// Shared separable convolution kernel: visits a `(2*radius+1)^2` neighbourhood,
/// weighting each valid cell by `weight(distance)` along each axis. Falls back
/// to the nearest-pixel value when the window carries no usable cell at all,
/// which happens when it crosses the raster edge entirely.
fn convolve(band: &RasterBand, col: f64, row: f64, radius: i64, weight: impl Fn(f64) -> f64) -> Option<f64> {
    let c0 = col.floor() as i64;
    let r0 = row.floor() as i64;
    let mut sum = 0.0;
    let mut weight_sum = 0.0;

    for dr in -radius + 1..=radius {
        for dc in -radius + 1..=radius {
            let cc = c0 + dc;
            let rr = r0 + dr;
            if let Some(v) = valid_value(band, cc, rr) {
                let wc = weight(col - cc as f64);
                let wr = weight(row - rr as f64);
                let w = wc * wr;
                sum += v * w;
                weight_sum += w;
            }
        }
    }

    if weight_sum.abs() < 1e-12 { sample_nearest(band, col, row) } else { Some(sum / weight_sum) }
}

fn neighbourhood_values(band: &RasterBand, col: f64, row: f64, radius: i64) -> Vec<f64> {
    let c0 = col.round() as i64;
    let r0 = row.round() as i64;
    let mut values = Vec::new();
    for dr in -radius..=radius {
        for dc in -radius..=radius {
            if let Some(v) = valid_value(band, c0 + dc, r0 + dr) {
                values.push(v);
            }
        }
    }
    values
}

fn sample_kernel_mean(band: &RasterBand, col: f64, row: f64, radius: i64) -> Option<f64> {
    let values = neighbourhood_values(band, col, row, radius);
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sample_kernel_mode(band: &RasterBand, col: f64, row: f64, radius: i64) -> Option<f64> {
    let values = neighbourhood_values(band, col, row, radius);
    if values.is_empty() {
        return None;
    }

    let mut best = values[0];
    let mut best_count = 0usize;
    for &candidate in &values {
        let count = values.iter().filter(|&&v| v == candidate).count();
        if count > best_count {
            best_count = count;
            best = candidate;
        }
    }
    Some(best)
}

fn sample_gauss(band: &RasterBand, col: f64, row: f64, radius: i64) -> Option<f64> {
    let sigma = radius.max(1) as f64;
    convolve(band, col, row, radius, move |t| (-t * t / (2.0 * sigma * sigma)).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_band(width: usize, height: usize, value: f64) -> RasterBand {
        RasterBand {
            width,
            height,
            data: vec![value; width * height],
            nodata: None,
            transform: crate::geotransform::GeoTransform::from_top_left_and_cell_size(0.0, 0.0, 1.0, -1.0),
            epsg: Some(4326),
        }
    }

    #[test]
    fn nearest_neighbour_matches_a_flat_band() {
        let band = flat_band(5, 5, 3.0);
        assert_eq!(sample(&band, 2.4, 2.6, SamplingAlgorithm::NearestNeighbour, None), Some(3.0));
    }

    #[test]
    fn bilinear_interpolation_of_a_flat_band_is_unchanged() {
        let band = flat_band(5, 5, 7.0);
        assert_eq!(sample(&band, 2.3, 2.7, SamplingAlgorithm::Bilinear, None), Some(7.0));
    }

    #[test]
    fn bilinear_falls_back_to_nearest_pixel_near_the_edge() {
        let band = flat_band(2, 2, 1.0);
        assert_eq!(sample(&band, 1.5, 1.5, SamplingAlgorithm::Bilinear, None), Some(1.0));
    }

    #[test]
    fn bilinear_falls_back_to_nearest_pixel_when_a_corner_is_nodata() {
        let mut band = flat_band(3, 3, 2.0);
        band.nodata = Some(-9999.0);
        band.data[0] = -9999.0; // corner (0,0) of the window sampled below
        assert_eq!(sample(&band, 0.5, 0.5, SamplingAlgorithm::Bilinear, None), Some(2.0));
    }

    #[test]
    fn average_over_a_flat_band_is_unchanged() {
        let band = flat_band(5, 5, 4.0);
        assert_eq!(sample(&band, 2.0, 2.0, SamplingAlgorithm::Average, None), Some(4.0));
    }

    #[test]
    fn mode_picks_the_most_frequent_neighbourhood_value() {
        let mut band = flat_band(3, 3, 1.0);
        band.data[4] = 1.0; // center unchanged, majority stays 1.0
        assert_eq!(sample(&band, 1.0, 1.0, SamplingAlgorithm::Mode, None), Some(1.0));
    }

    #[test]
    fn a_radius_override_widens_the_averaging_window() {
        let mut band = flat_band(7, 7, 2.0);
        band.data[0] = 100.0; // corner (0,0), only inside a radius-3+ window from (3,3)
        assert_eq!(sample(&band, 3.0, 3.0, SamplingAlgorithm::Average, Some(1)), Some(2.0));
        assert!(sample(&band, 3.0, 3.0, SamplingAlgorithm::Average, Some(3)).unwrap() > 2.0);
    }
}
