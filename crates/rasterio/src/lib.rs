mod crs;
mod dictionary;
mod error;
mod geotransform;
mod raster;
mod sampling;
mod slope;
mod source;
mod subset;
mod zonal;

pub use crs::reproject_point;
pub use dictionary::FileDictionary;
pub use error::{Error, Result};
pub use geotransform::GeoTransform;
pub use raster::{RasterBand, RasterSourceStrategy};
pub use sampling::{SamplingAlgorithm, sample};
pub use slope::{Derivatives, slope_aspect};
pub use source::{RasterSource, RasterSourceOptions, RasterSourceRegistry, Sample};
pub use subset::{subset_raster, write_geotiff, SubsetMemoryPool, SubsetReservation};
pub use zonal::{ZonalStats, zonal_stats};
