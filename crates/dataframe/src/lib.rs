mod column;
mod error;
mod frame;
mod reassembly;
mod wire;

pub use column::{role, Column, ElementType, Encoding};
pub use error::{Error, Result};
pub use frame::DataFrame;
pub use reassembly::Reassembler;
pub use wire::{eof_record, pack_key, serialize_frame, unpack_key, FrameRecord, MAX_NAME_SIZE, RECORD_KIND_COLUMN, RECORD_KIND_EOF, RECORD_KIND_META};
