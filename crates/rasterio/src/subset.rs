use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tiff::encoder::{colortype, TiffEncoder};

use crate::error::{Error, Result};
use crate::geotransform::GeoTransform;
use crate::raster::RasterBand;
use crate::sampling::{self, SamplingAlgorithm};

/// Process-wide bound on the bytes held by in-flight raster subsets (spec
/// §4.4). Admission is checked before a subset is materialized, rather than
/// discovered after the fact, so a caller can back off before allocating.
#[derive(Clone)]
pub struct SubsetMemoryPool {
    budget_bytes: u64,
    in_use: Arc<AtomicU64>,
}

impl SubsetMemoryPool {
    pub fn new(budget_bytes: u64) -> Self {
        SubsetMemoryPool {
            budget_bytes,
            in_use: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn in_use_bytes(&self) -> u64 {
        self.in_use.load(Ordering::SeqCst)
    }

    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    /// Reserves `bytes` against the budget, returning a guard that releases
    /// the reservation when dropped. Fails admission outright rather than
    /// letting the pool run over budget.
    pub fn reserve(&self, bytes: u64) -> Result<SubsetReservation> {
        loop {
            let current = self.in_use.load(Ordering::SeqCst);
            let next = current + bytes;
            if next > self.budget_bytes {
                return Err(Error::MemoryPoolExhausted {
                    requested_bytes: bytes,
                    budget_bytes: self.budget_bytes,
                });
            }
            if self.in_use.compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
                return Ok(SubsetReservation { in_use: self.in_use.clone(), bytes });
            }
        }
    }
}

/// Default 8 GiB process-wide subset memory budget.
impl Default for SubsetMemoryPool {
    fn default() -> Self {
        SubsetMemoryPool::new(8 * (1 << 30))
    }
}

pub struct SubsetReservation {
    in_use: Arc<AtomicU64>,
    bytes: u64,
}

impl Drop for SubsetReservation {
    fn drop(&mut self) {
        self.in_use.fetch_sub(self.bytes, Ordering::SeqCst);
    }
}

/// Clips `band` to `envelope = (xmin, ymin, xmax, ymax)` in the band's own
/// CRS, resampling with `algorithm`, and returns a new single-band raster
/// whose `geo_transform` is shifted to the clipped window's origin (spec
/// §4.4's Subsetting). An envelope that does not overlap the raster at all
/// fails with `OutOfBounds`; admission into `pool` is requested for the
/// output buffer before it is allocated.
pub fn subset_raster(
    band: &RasterBand,
    envelope: (f64, f64, f64, f64),
    algorithm: SamplingAlgorithm,
    pool: &SubsetMemoryPool,
) -> Result<RasterBand> {
    let (xmin, ymin, xmax, ymax) = envelope;

    let (col_a, row_a) = band.transform.world_to_cell(xmin, ymax)?;
    let (col_b, row_b) = band.transform.world_to_cell(xmax, ymin)?;

    let col_start = col_a.floor().min(col_b.floor()) as i64;
    let row_start = row_a.floor().min(row_b.floor()) as i64;
    let col_end = col_a.ceil().max(col_b.ceil()) as i64;
    let row_end = row_a.ceil().max(row_b.ceil()) as i64;

    let clipped_col_start = col_start.max(0);
    let clipped_row_start = row_start.max(0);
    let clipped_col_end = col_end.min(band.width as i64);
    let clipped_row_end = row_end.min(band.height as i64);

    if clipped_col_start >= clipped_col_end || clipped_row_start >= clipped_row_end {
        return Err(Error::OutOfBounds { x: xmin, y: ymin });
    }

    let width = (clipped_col_end - clipped_col_start) as usize;
    let height = (clipped_row_end - clipped_row_start) as usize;

    let byte_size = (width * height * std::mem::size_of::<f64>()) as u64;
    let _reservation = pool.reserve(byte_size)?;

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height as i64 {
        for col in 0..width as i64 {
            let source_col = (clipped_col_start + col) as f64;
            let source_row = (clipped_row_start + row) as f64;
            let value = sampling::sample(band, source_col, source_row, algorithm, None).unwrap_or(f64::NAN);
            data.push(value);
        }
    }

    let (origin_x, origin_y) = band.transform.apply(clipped_col_start as f64, clipped_row_start as f64);
    let coefficients = band.transform.coefficients();
    let transform = GeoTransform::new([origin_x, coefficients[1], coefficients[2], origin_y, coefficients[4], coefficients[5]]);

    Ok(RasterBand {
        width,
        height,
        data,
        nodata: band.nodata,
        transform,
        epsg: band.epsg,
    })
}

/// Writes `band` out as a single-band float32 GeoTIFF, grounded on the
/// upstream GeoTIFF writer's `TiffEncoder`/`new_image` pattern.
pub fn write_geotiff(band: &RasterBand, path: &str) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::WriteFailed {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(|e| Error::WriteFailed {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    let samples: Vec<f32> = band.data.iter().map(|&v| v as f32).collect();

    let mut image = encoder
        .new_image::<colortype::Gray32Float>(band.width as u32, band.height as u32)
        .map_err(|e| Error::WriteFailed {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

    image.write_data(&samples).map_err(|e| Error::WriteFailed {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geotransform::GeoTransform;

    fn band(width: usize, height: usize, data: Vec<f64>) -> RasterBand {
        RasterBand {
            width,
            height,
            data,
            nodata: None,
            transform: GeoTransform::from_top_left_and_cell_size(0.0, 0.0, 1.0, -1.0),
            epsg: Some(4326),
        }
    }

    #[test]
    fn clips_to_the_requested_envelope_and_shifts_the_origin() {
        let source = band(5, 5, (0..25).map(|v| v as f64).collect());
        let pool = SubsetMemoryPool::default();

        let subset = subset_raster(&source, (1.0, -3.0, 3.0, -1.0), SamplingAlgorithm::NearestNeighbour, &pool).unwrap();

        assert_eq!(subset.width, 2);
        assert_eq!(subset.height, 2);
        assert_eq!(subset.transform.top_left(), (1.0, -1.0));
    }

    #[test]
    fn envelope_entirely_outside_the_raster_is_out_of_bounds() {
        let source = band(5, 5, vec![0.0; 25]);
        let pool = SubsetMemoryPool::default();

        let err = subset_raster(&source, (100.0, 100.0, 110.0, 110.0), SamplingAlgorithm::NearestNeighbour, &pool).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { .. }));
    }

    #[test]
    fn admission_control_rejects_a_subset_over_budget() {
        let source = band(100, 100, vec![1.0; 10_000]);
        let pool = SubsetMemoryPool::new(8); // 8 bytes: a single f64 cell.

        let err = subset_raster(&source, (0.0, -100.0, 100.0, 0.0), SamplingAlgorithm::NearestNeighbour, &pool).unwrap_err();
        assert!(matches!(err, Error::MemoryPoolExhausted { .. }));
    }

    #[test]
    fn reservation_release_frees_the_budget_on_drop() {
        let pool = SubsetMemoryPool::new(16);
        {
            let _reservation = pool.reserve(16).unwrap();
            assert_eq!(pool.in_use_bytes(), 16);
        }
        assert_eq!(pool.in_use_bytes(), 0);
    }
}
