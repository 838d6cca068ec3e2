use ioblock::{BlockCache, ByteSource, read_field};

use crate::constants::SIGNATURE;
use crate::error::{Error, Result};

/// Per-file state parsed once from the superblock (spec §3 "HDF5 file
/// context"). Constant for the lifetime of the context and shareable across
/// concurrent dataset reads on the same file (§5: "A single context is
/// shared by concurrent dataset reads on the same file").
#[derive(Debug, Clone, Copy)]
pub struct FileContext {
    pub offset_size: u8,
    pub length_size: u8,
    pub group_leaf_k: u16,
    pub group_internal_k: u16,
    pub root_group_addr: u64,
}

impl FileContext {
    pub fn parse<S: ByteSource>(cache: &BlockCache<S>) -> Result<Self> {
        let header = cache.read_bytes(0, 32)?;
        let header = header.as_slice();

        if header[0..8] != SIGNATURE {
            return Err(Error::corrupt("missing HDF5 superblock signature"));
        }

        let version = header[8];
        if version != 0 {
            return Err(Error::corrupt(format!("unsupported superblock version {version}")));
        }

        let offset_size = header[13];
        let length_size = header[14];
        if !matches!(offset_size, 4 | 8) || !matches!(length_size, 4 | 8) {
            return Err(Error::corrupt("superblock offset/length size must be 4 or 8"));
        }

        let group_leaf_k = read_field(header, 16, 2)? as u16;
        let group_internal_k = read_field(header, 18, 2)? as u16;

        // base_address, free_space_addr, end_of_file_addr, driver_info_addr,
        // then the root group symbol table entry: link_name_offset,
        // object_header_address, cache_type(4), reserved(4), scratch(16).
        let addr_size = offset_size as usize;
        let root_entry_start = 24 + 4 * addr_size;
        let root_entry_len = 2 * addr_size + 4 + 4 + 16;

        let root_block = cache.read_bytes(0, (root_entry_start + root_entry_len) as u64)?;
        let root_block = root_block.as_slice();
        let root_group_addr = read_field(root_block, root_entry_start + addr_size, addr_size)?;

        Ok(FileContext {
            offset_size,
            length_size,
            group_leaf_k,
            group_internal_k,
            root_group_addr,
        })
    }
}
