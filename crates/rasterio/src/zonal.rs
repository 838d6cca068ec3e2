use crate::raster::RasterBand;

/// Summary statistics computed over a window of cells centred on a sample
/// point, restricted to cells within `radius_pixels` of the centre (spec
/// §4.4's zonal statistics). Nodata cells are excluded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZonalStats {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub stdev: f64,
    pub mad: f64,
}

/// Computes zonal statistics over the square window of side `2*radius_pixels+1`
/// centred at cell `(center_col, center_row)`, keeping only cells whose
/// Euclidean pixel distance from the centre is `<= radius_pixels`. Returns
/// `None` when no cell in the window carries valid data.
pub fn zonal_stats(band: &RasterBand, center_col: i64, center_row: i64, radius_pixels: i64) -> Option<ZonalStats> {
    let radius_sq = (radius_pixels * radius_pixels) as f64;
    let mut values = Vec::new();

    for dr in -radius_pixels..=radius_pixels {
        for dc in -radius_pixels..=radius_pixels {
            if (dr * dr + dc * dc) as f64 > radius_sq {
                continue;
            }
            let Some(v) = band.value_at_cell(center_col + dc, center_row + dr) else { continue };
            if band.is_nodata(v) {
                continue;
            }
            values.push(v);
        }
    }

    if values.is_empty() {
        return None;
    }

    let count = values.len() as u64;
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / count as f64;

    let mut sorted = values.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = if sorted.len() % 2 == 0 {
        let mid = sorted.len() / 2;
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[sorted.len() / 2]
    };

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    let stdev = variance.sqrt();
    let mad = values.iter().map(|v| (v - mean).abs()).sum::<f64>() / count as f64;

    Some(ZonalStats { count, min, max, mean, median, stdev, mad })
}
