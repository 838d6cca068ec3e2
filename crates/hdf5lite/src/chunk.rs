use ioblock::{BlockCache, ByteSource};

use crate::btree::ChunkKey;
use crate::dataset::{DatasetDescriptor, FilterKind};
use crate::error::{Error, Result};
use crate::filter::{inflate, unshuffle};

/// Writes the dataset's declared fill value across `buffer` before any chunk
/// is applied, so rows covered by no chunk (spec §6, sparse chunk B-tree)
/// read back as fill instead of zero.
pub fn fill_dense(buffer: &mut [u8], descriptor: &DatasetDescriptor, type_size: u32, _rank: usize) {
    let fill_size = descriptor.fill_size as usize;
    if fill_size == 0 {
        return;
    }

    let elem = type_size as usize;
    let n = fill_size.min(elem);
    let fill = &descriptor.fill_value_bytes[..n];
    for chunk in buffer.chunks_mut(elem) {
        let copy_len = chunk.len().min(n);
        chunk[..copy_len].copy_from_slice(&fill[..copy_len]);
    }
}

/// Walks the chunk B-tree keys already collected for a dataset, decodes each
/// chunk whose row span overlaps `[start_row, start_row+num_rows)`, and
/// copies the overlapping rows into `buffer` (spec §4.2 chunk pipeline).
///
/// Chunking along dimensions after the first is only supported when a chunk
/// spans the dataset's full extent in that dimension; the datasets this
/// parser targets never chunk column-wise.
pub fn read_chunked<S: ByteSource>(
    cache: &BlockCache<S>,
    keys: &[ChunkKey],
    descriptor: &DatasetDescriptor,
    start_row: u64,
    num_rows: u64,
    row_stride: u64,
    type_size: u32,
    buffer: &mut [u8],
) -> Result<()> {
    let rank = descriptor.num_dimensions;
    let dims = descriptor.dims();
    let chunk_dims = &descriptor.chunk_elements_per_dim;
    let elem = type_size as usize;
    let cols = row_stride as usize;

    for d in 1..rank {
        if chunk_dims[d] < dims[d] {
            return Err(Error::corrupt("partial chunking along non-leading dimensions is not supported"));
        }
    }

    for key in keys {
        let chunk_row_start = key.slice[0];
        let chunk_row_len = chunk_dims[0];
        let chunk_row_end = chunk_row_start + chunk_row_len;

        let overlap_start = chunk_row_start.max(start_row);
        let overlap_end = chunk_row_end.min(start_row + num_rows);
        if overlap_start >= overlap_end {
            continue;
        }

        let raw = cache.read_bytes(key.chunk_addr, key.chunk_size_bytes as u64)?;
        let mut decoded = raw.as_slice().to_vec();

        if descriptor.has_filter(FilterKind::Deflate) {
            let chunk_elements: u64 = chunk_dims[..rank].iter().product();
            decoded = inflate(&decoded, chunk_elements as usize * elem)?;
        }
        if descriptor.has_filter(FilterKind::Shuffle) {
            decoded = unshuffle(&decoded, elem)?;
        }

        for row in overlap_start..overlap_end {
            let chunk_local_row = (row - chunk_row_start) as usize;
            let src_off = chunk_local_row * cols * elem;
            let dst_off = (row - start_row) as usize * cols * elem;
            buffer[dst_off..dst_off + cols * elem].copy_from_slice(&decoded[src_off..src_off + cols * elem]);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{FilterEntry, Layout};
    use ioblock::MemoryByteSource;

    fn descriptor_1d(rows: u64, chunk_rows: u64) -> DatasetDescriptor {
        let mut d = DatasetDescriptor::default();
        d.num_dimensions = 1;
        d.dimensions[0] = rows;
        d.layout = Some(Layout::Chunked);
        d.chunk_elements_per_dim = vec![chunk_rows];
        d.chunk_element_size = Some(4);
        d
    }

    #[test]
    fn copies_overlapping_rows_from_single_uncompressed_chunk() {
        let elem: Vec<u8> = (0..10i32).flat_map(|v| v.to_le_bytes()).collect();
        let cache = BlockCache::with_capacity(MemoryByteSource::new(elem.clone()), 4, 64);

        let descriptor = descriptor_1d(10, 10);
        let key = ChunkKey {
            chunk_size_bytes: elem.len() as u32,
            filter_mask: 0,
            slice: vec![0],
            chunk_addr: 0,
        };

        let mut buffer = vec![0u8; 4 * 4];
        read_chunked(&cache, &[key], &descriptor, 2, 4, 1, 4, &mut buffer).unwrap();

        let values: Vec<i32> = buffer.chunks(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(values, vec![2, 3, 4, 5]);
    }

    #[test]
    fn fill_dense_applies_declared_fill_value() {
        let mut descriptor = descriptor_1d(4, 2);
        descriptor.fill_size = 4;
        descriptor.fill_value_bytes[..4].copy_from_slice(&(-1i32).to_le_bytes());
        descriptor.filters.push(FilterEntry {
            kind: FilterKind::Deflate,
            params: vec![],
        });
        descriptor.filters.clear();

        let mut buffer = vec![0u8; 16];
        fill_dense(&mut buffer, &descriptor, 4, 1);

        let values: Vec<i32> = buffer.chunks(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
        assert_eq!(values, vec![-1, -1, -1, -1]);
    }
}
