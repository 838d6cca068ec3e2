//! Thin facade crate that wires the pipeline crates together.
//!
//! A product-specific reader (out of scope, see spec §1) drives a pipeline by:
//! opening an HDF5 dataset through [`hdf5lite`], appending rows to a
//! [`dataframe::DataFrame`], handing the completed frame to a
//! [`sampler::Scheduler`], and consuming the result from a `FrameSender`'s
//! publisher channel.

pub use dataframe;
pub use hdf5lite;
pub use ioblock;
pub use rasterio;
pub use sampler;
