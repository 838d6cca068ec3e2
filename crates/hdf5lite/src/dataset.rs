use crate::constants::MAX_NDIMS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    FixedPoint,
    FloatingPoint,
    String,
    BitField,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Compact,
    Contiguous,
    Chunked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Deflate,
    Shuffle,
}

#[derive(Debug, Clone)]
pub struct FilterEntry {
    pub kind: FilterKind,
    pub params: Vec<u32>,
}

/// Dataset descriptor filled in while walking object-header messages (spec
/// §3). All fields are optional until the corresponding message has been
/// seen; `read_dataset` only succeeds once layout, dataspace and datatype
/// have all been observed.
#[derive(Debug, Clone, Default)]
pub struct DatasetDescriptor {
    pub data_type: Option<DataType>,
    pub type_size_bytes: Option<u32>,

    pub fill_value_bytes: [u8; 8],
    pub fill_size: u8,

    pub dimensions: [u64; MAX_NDIMS],
    pub num_dimensions: usize,

    pub layout: Option<Layout>,
    pub data_address: Option<u64>,
    pub data_size: Option<u64>,
    pub compact_data: Option<Vec<u8>>,

    pub chunk_elements_per_dim: Vec<u64>,
    pub chunk_element_size: Option<u32>,
    pub chunk_buffer_bytes: Option<u64>,
    pub chunk_btree_addr: Option<u64>,

    pub filters: Vec<FilterEntry>,

    pub highest_level_reached: usize,
}

impl DatasetDescriptor {
    pub fn has_filter(&self, kind: FilterKind) -> bool {
        self.filters.iter().any(|f| f.kind == kind)
    }

    pub fn dims(&self) -> &[u64] {
        &self.dimensions[..self.num_dimensions]
    }

    /// Chunk element count per logical element (product of
    /// `chunk_elements_per_dim`, excluding the trailing element-size entry).
    pub fn chunk_element_count(&self) -> u64 {
        self.chunk_elements_per_dim[..self.num_dimensions].iter().product()
    }

    pub fn is_terminal(&self) -> bool {
        self.layout.is_some()
    }
}
