use std::time::Duration;

use rasterio::SamplingAlgorithm;

/// Per-raster sampler tunables recognized by spec §6's configuration table:
/// the resampling kernel, an optional radius override, whether to emit
/// zonal statistics and/or slope/aspect derivative columns, and the
/// reprojection/area-of-interest overrides for that raster's points.
#[derive(Debug, Clone)]
pub struct RasterSourceConfig {
    pub sampling_algo: SamplingAlgorithm,
    pub sampling_radius: f64,
    pub zonal_stats: bool,
    pub slope_aspect: bool,
    pub slope_scale_length: f64,
    pub proj_pipeline: Option<String>,
    pub aoi_bbox: Option<(f64, f64, f64, f64)>,
}

impl RasterSourceConfig {
    pub fn with_sampling_algo(mut self, algo: SamplingAlgorithm) -> Self {
        self.sampling_algo = algo;
        self
    }

    pub fn with_sampling_radius(mut self, radius_m: f64) -> Self {
        self.sampling_radius = radius_m;
        self
    }

    pub fn with_zonal_stats(mut self, enabled: bool) -> Self {
        self.zonal_stats = enabled;
        self
    }

    pub fn with_slope_aspect(mut self, enabled: bool, scale_length_m: f64) -> Self {
        self.slope_aspect = enabled;
        self.slope_scale_length = scale_length_m;
        self
    }

    pub fn with_proj_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.proj_pipeline = Some(pipeline.into());
        self
    }

    pub fn with_aoi_bbox(mut self, bbox: (f64, f64, f64, f64)) -> Self {
        self.aoi_bbox = Some(bbox);
        self
    }

    pub fn to_raster_options(&self) -> rasterio::RasterSourceOptions {
        rasterio::RasterSourceOptions {
            algorithm: self.sampling_algo,
            sampling_radius_m: self.sampling_radius,
            zonal_stats: self.zonal_stats,
            slope_aspect: self.slope_aspect,
            slope_scale_length_m: self.slope_scale_length,
        }
    }
}

impl Default for RasterSourceConfig {
    fn default() -> Self {
        RasterSourceConfig {
            sampling_algo: SamplingAlgorithm::NearestNeighbour,
            sampling_radius: 0.0,
            zonal_stats: false,
            slope_aspect: false,
            slope_scale_length: 0.0,
            proj_pipeline: None,
            aoi_bbox: None,
        }
    }
}

/// Tunables for the shared block-cached I/O layer (spec §6's `IO_CACHE_MAX` /
/// `IO_BLOCK_SIZE` constants, exposed as a builder rather than env vars).
#[derive(Debug, Clone, Copy)]
pub struct IoCacheConfig {
    pub cache_capacity_bytes: u64,
    pub block_size_bytes: u64,
}

impl IoCacheConfig {
    pub fn with_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity_bytes = bytes;
        self
    }

    pub fn with_block_size(mut self, bytes: u64) -> Self {
        self.block_size_bytes = bytes;
        self
    }
}

impl Default for IoCacheConfig {
    fn default() -> Self {
        IoCacheConfig {
            cache_capacity_bytes: 1 << 20,
            block_size_bytes: 1 << 20,
        }
    }
}

/// Tunables for the sampler/frame-runner subsystem (spec §6, §9): the advisory
/// poll timeout runners use to re-check the `active` flag, and the process-wide
/// raster subset memory budget.
#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    pub sys_timeout: Duration,
    pub subset_pool_bytes: u64,
}

impl SamplerConfig {
    pub fn with_sys_timeout(mut self, timeout: Duration) -> Self {
        self.sys_timeout = timeout;
        self
    }

    pub fn with_subset_pool_bytes(mut self, bytes: u64) -> Self {
        self.subset_pool_bytes = bytes;
        self
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            sys_timeout: Duration::from_secs(1),
            subset_pool_bytes: 8 * (1 << 30),
        }
    }
}
