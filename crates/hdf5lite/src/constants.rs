pub const SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', 0x0D, 0x0A, 0x1A, 0x0A];
pub const MAX_NDIMS: usize = 32;

pub const OHDR_V1_PREFIX: u8 = 0x01;
pub const OHDR_V2_MAGIC: [u8; 4] = *b"OHDR";
pub const OCHK_MAGIC: [u8; 4] = *b"OCHK";

pub const TREE_MAGIC: [u8; 4] = *b"TREE";
pub const HEAP_MAGIC: [u8; 4] = *b"HEAP";
pub const SNOD_MAGIC: [u8; 4] = *b"SNOD";
pub const FRHP_MAGIC: [u8; 4] = *b"FRHP";
pub const FHDB_MAGIC: [u8; 4] = *b"FHDB";
pub const FHIB_MAGIC: [u8; 4] = *b"FHIB";

pub const BTREE_GROUP_NODE_TYPE: u8 = 0;
pub const BTREE_CHUNK_NODE_TYPE: u8 = 1;

/// Undefined-address sentinel: all bits set, width-independent because the
/// parser always widens addresses to `u64` before comparing.
pub const UNDEFINED_ADDRESS: u64 = u64::MAX;

pub mod message {
    pub const DATASPACE: u16 = 0x01;
    pub const LINK_INFO: u16 = 0x02;
    pub const DATATYPE: u16 = 0x03;
    pub const FILL_VALUE: u16 = 0x05;
    pub const LINK: u16 = 0x06;
    pub const DATA_LAYOUT: u16 = 0x08;
    pub const FILTER_PIPELINE: u16 = 0x0B;
    pub const HEADER_CONT: u16 = 0x10;
    pub const SYMBOL_TABLE: u16 = 0x11;
}

pub mod filter_id {
    pub const DEFLATE: u16 = 1;
    pub const SHUFFLE: u16 = 2;
}
