mod config;
mod error;
mod frame_sampler;
mod runner;

pub use config::{IoCacheConfig, RasterSourceConfig, SamplerConfig};
pub use error::{Error, Result};
pub use frame_sampler::{NamedRaster, RasterSamplerRunner};
pub use runner::{FrameRunner, FrameSender, Scheduler};
