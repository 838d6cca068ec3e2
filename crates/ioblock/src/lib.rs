//! Block-cached positional byte-range I/O (component C1).
//!
//! A bounded, block-aligned cache sits in front of any [`source::ByteSource`]
//! (a local file or, in principle, an object-storage adapter) so that the
//! HDF5 parser and raster readers built on top of it can issue small,
//! arbitrarily-offset reads without hammering the underlying source.

mod cache;
mod error;
mod source;

pub use cache::{BlockCache, CacheEntry, CacheSlice, IO_BLOCK_SIZE, IO_CACHE_MAX, read_field};
pub use error::{Error, Result};
pub use source::{ByteSource, FileByteSource, MemoryByteSource};
