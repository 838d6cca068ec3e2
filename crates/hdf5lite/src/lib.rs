mod btree;
mod chunk;
mod constants;
mod context;
mod dataset;
mod error;
mod filter;
mod fractalheap;
mod localheap;
mod objectheader;
mod parser;

pub use context::FileContext;
pub use dataset::{DataType, DatasetDescriptor, FilterEntry, FilterKind, Layout};
pub use error::{Error, Result};
pub use parser::{Parser, ReadResult, decompose_path};
