use ioblock::{BlockCache, ByteSource, read_field};

use crate::constants::HEAP_MAGIC;
use crate::error::{Error, Result};

/// A v1 local heap: a flat data block addressed by byte offset, used to
/// store symbol (link) names referenced from a symbol table node.
pub struct LocalHeap {
    data: Vec<u8>,
}

impl LocalHeap {
    pub fn parse<S: ByteSource>(cache: &BlockCache<S>, addr: u64, offset_size: u8, length_size: u8) -> Result<Self> {
        let addr_size = offset_size as usize;
        let len_size = length_size as usize;
        let prefix_len = 4 + 1 + 3 + len_size + len_size + addr_size;
        let prefix = cache.read_bytes(addr, prefix_len as u64)?;
        let prefix = prefix.as_slice();

        if prefix[0..4] != HEAP_MAGIC {
            return Err(Error::corrupt("local heap missing HEAP magic"));
        }

        let data_seg_size = read_field(prefix, 8 + len_size, len_size)?;
        let data_seg_addr_off = 8 + len_size + len_size;
        let data_seg_addr = read_field(prefix, data_seg_addr_off, addr_size)?;

        let data = cache.read_bytes(data_seg_addr, data_seg_size)?.as_slice().to_vec();
        Ok(Self { data })
    }

    /// Reads a NUL-terminated name starting at `offset` into the heap data segment.
    pub fn name_at(&self, offset: u64) -> Result<String> {
        let start = offset as usize;
        let end = self.data[start..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| start + p)
            .ok_or_else(|| Error::corrupt("local heap name is not NUL-terminated"))?;
        Ok(String::from_utf8_lossy(&self.data[start..end]).into_owned())
    }
}
