use std::collections::HashMap;

use log::{debug, warn};

use crate::crs::reproject_point;
use crate::dictionary::FileDictionary;
use crate::error::{Error, Result};
use crate::raster::{RasterBand, RasterSourceStrategy};
use crate::sampling::{self, SamplingAlgorithm};
use crate::slope::{self, Derivatives};
use crate::zonal::{self, ZonalStats};

const METERS_PER_DEGREE_AT_EQUATOR: f64 = 111_320.0;

/// One value pulled out of a raster at a point, tagged with enough identity
/// (`file_id`, `time_ns`, `band`) to tell apart the several samples a
/// multi-epoch/multi-file source can return for the same point (spec §4.4/4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub time_ns: i64,
    pub file_id: u64,
    pub band: Option<u32>,
    pub flags: Option<u32>,
    pub vertical_shift: f64,
    pub stats: Option<ZonalStats>,
    pub derivs: Option<Derivatives>,
}

/// Per-source tunables threaded in from the sampler configuration (spec §6):
/// the resampling kernel, an optional radius override in metres, and whether
/// to additionally compute zonal statistics and/or slope/aspect derivatives.
#[derive(Debug, Clone, Copy)]
pub struct RasterSourceOptions {
    pub algorithm: SamplingAlgorithm,
    pub sampling_radius_m: f64,
    pub zonal_stats: bool,
    pub slope_aspect: bool,
    pub slope_scale_length_m: f64,
}

impl Default for RasterSourceOptions {
    fn default() -> Self {
        RasterSourceOptions {
            algorithm: SamplingAlgorithm::NearestNeighbour,
            sampling_radius_m: 0.0,
            zonal_stats: false,
            slope_aspect: false,
            slope_scale_length_m: 0.0,
        }
    }
}

/// A single named raster, lazily loaded through its `RasterSourceStrategy` and
/// resampled per `options` (spec §4.4, grounded on `RasterFileDictionary`).
pub struct RasterSource {
    band: RasterBand,
    file_id: u64,
    options: RasterSourceOptions,
}

impl RasterSource {
    pub fn open(strategy: RasterSourceStrategy, dictionary: &FileDictionary, algorithm: SamplingAlgorithm) -> Result<Self> {
        Self::open_with_options(strategy, dictionary, RasterSourceOptions { algorithm, ..RasterSourceOptions::default() })
    }

    pub fn open_with_options(strategy: RasterSourceStrategy, dictionary: &FileDictionary, options: RasterSourceOptions) -> Result<Self> {
        let path = match &strategy {
            RasterSourceStrategy::GeoTiffFile(path) => path.clone(),
            RasterSourceStrategy::InMemory(_) => "<in-memory>".to_string(),
        };
        let band = strategy.load()?;
        let file_id = dictionary.add(&path, false);

        Ok(RasterSource { band, file_id, options })
    }

    pub fn band(&self) -> &RasterBand {
        &self.band
    }

    /// Converts the configured sampling radius (metres) to a pixel radius at
    /// `lat_deg`, per spec §4.4: geographic pixel widths are converted to
    /// metres via `111320 * cos(lat)` before dividing. Returns `None` when no
    /// radius override was configured (callers fall back to the algorithm's
    /// default window).
    fn radius_pixels(&self, lat_deg: f64) -> Option<i64> {
        if self.options.sampling_radius_m <= 0.0 {
            return None;
        }

        let cell_size_x = self.band.transform.cell_size_x().abs();
        let pixel_size_m = if self.is_geographic() { cell_size_x * METERS_PER_DEGREE_AT_EQUATOR * lat_deg.to_radians().cos() } else { cell_size_x };

        if pixel_size_m <= 0.0 {
            return None;
        }

        Some((self.options.sampling_radius_m / pixel_size_m).ceil() as i64)
    }

    fn is_geographic(&self) -> bool {
        matches!(self.band.epsg, Some(4326))
    }

    /// Samples every point, returning one list per point. A point that falls
    /// outside the raster extent or lands entirely on nodata yields an empty
    /// list. `source_crs` is the EPSG code the points are expressed in
    /// (typically a frame's `target_crs`); `None` skips reprojection.
    pub fn get_samples(&self, points: &[(f64, f64, f64, i64)], source_crs: Option<u32>) -> Vec<Vec<Sample>> {
        points
            .iter()
            .map(|&(x, y, _z, time_ns)| {
                let (x, y) = match (source_crs, self.band.epsg) {
                    (Some(from), Some(to)) if from != to => match reproject_point(x, y, from, to) {
                        Ok(p) => p,
                        Err(err) => {
                            warn!("reprojection from EPSG:{from} to EPSG:{to} failed: {err}");
                            return Vec::new();
                        }
                    },
                    _ => (x, y),
                };

                match self.band.transform.world_to_cell(x, y) {
                    Ok((col, row)) => {
                        let radius = self.radius_pixels(y);
                        match sampling::sample(&self.band, col, row, self.options.algorithm, radius) {
                            Some(value) => vec![self.build_sample(col, row, radius, value, time_ns)],
                            None => {
                                debug!("no valid sample at cell ({col}, {row})");
                                Vec::new()
                            }
                        }
                    }
                    Err(err) => {
                        warn!("failed to invert geotransform for point ({x}, {y}): {err}");
                        Vec::new()
                    }
                }
            })
            .collect()
    }

    fn build_sample(&self, col: f64, row: f64, radius: Option<i64>, value: f64, time_ns: i64) -> Sample {
        let center_col = col.round() as i64;
        let center_row = row.round() as i64;

        let stats = if self.options.zonal_stats {
            let stats_radius = radius.unwrap_or_else(|| sampling::default_radius_pixels(self.options.algorithm));
            zonal::zonal_stats(&self.band, center_col, center_row, stats_radius)
        } else {
            None
        };

        let derivs = if self.options.slope_aspect {
            Some(slope::slope_aspect(&self.band, center_col, center_row, self.options.slope_scale_length_m))
        } else {
            None
        };

        Sample {
            value,
            time_ns,
            file_id: self.file_id,
            band: Some(0),
            flags: None,
            vertical_shift: 0.0,
            stats,
            derivs,
        }
    }
}

/// Names a set of `RasterSource`s so a subsetting request can look one up by
/// key rather than carrying a reference around directly, mirroring
/// `FileDictionary`'s interning of paths.
#[derive(Default)]
pub struct RasterSourceRegistry {
    sources: HashMap<String, RasterSource>,
}

impl RasterSourceRegistry {
    pub fn new() -> Self {
        RasterSourceRegistry { sources: HashMap::new() }
    }

    pub fn register(&mut self, name: impl Into<String>, source: RasterSource) {
        self.sources.insert(name.into(), source);
    }

    pub fn get(&self, name: &str) -> Result<&RasterSource> {
        self.sources.get(name).ok_or_else(|| Error::UnknownSource { name: name.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geotransform::GeoTransform;

    fn source(width: usize, height: usize, value: f64) -> RasterSource {
        let band = RasterBand {
            width,
            height,
            data: vec![value; width * height],
            nodata: None,
            transform: GeoTransform::from_top_left_and_cell_size(0.0, 0.0, 1.0, -1.0),
            epsg: Some(4326),
        };
        RasterSource {
            band,
            file_id: 1,
            options: RasterSourceOptions { algorithm: SamplingAlgorithm::NearestNeighbour, ..RasterSourceOptions::default() },
        }
    }

    #[test]
    fn get_samples_returns_one_list_per_point() {
        let source = source(5, 5, 42.0);
        let points = [(2.0, -2.0, 0.0, 0), (100.0, -100.0, 0.0, 0)];
        let samples = source.get_samples(&points, None);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0][0].value, 42.0);
        assert!(samples[1].is_empty());
    }

    #[test]
    fn zonal_stats_are_attached_when_enabled() {
        let mut src = source(5, 5, 3.0);
        src.options.zonal_stats = true;
        let samples = src.get_samples(&[(2.0, -2.0, 0.0, 0)], None);
        assert!(samples[0][0].stats.is_some());
    }

    #[test]
    fn derivatives_are_attached_when_enabled() {
        let mut src = source(5, 5, 3.0);
        src.options.slope_aspect = true;
        src.options.slope_scale_length_m = 1.0;
        let samples = src.get_samples(&[(2.0, -2.0, 0.0, 0)], None);
        assert!(samples[0][0].derivs.is_some());
    }

    #[test]
    fn registry_reports_unknown_source_by_name() {
        let registry = RasterSourceRegistry::new();
        assert!(matches!(registry.get("missing"), Err(Error::UnknownSource { .. })));
    }

    #[test]
    fn registry_resolves_a_registered_source() {
        let mut registry = RasterSourceRegistry::new();
        registry.register("elevation", source(3, 3, 1.0));
        assert!(registry.get("elevation").is_ok());
    }
}
