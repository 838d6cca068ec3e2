use ioblock::{BlockCache, ByteSource, read_field};

use crate::constants::{BTREE_CHUNK_NODE_TYPE, BTREE_GROUP_NODE_TYPE, SNOD_MAGIC, TREE_MAGIC};
use crate::error::{Error, Result};
use crate::localheap::LocalHeap;

/// One chunk B-tree key: the chunk's location within the dataset plus its
/// on-disk size and per-chunk filter mask (spec §3, §4.2).
#[derive(Debug, Clone)]
pub struct ChunkKey {
    pub chunk_size_bytes: u32,
    pub filter_mask: u32,
    pub slice: Vec<u64>,
    pub chunk_addr: u64,
}

fn tree_header<S: ByteSource>(cache: &BlockCache<S>, addr: u64, offset_size: u8) -> Result<(u8, u8, u16, u64)> {
    let addr_size = offset_size as usize;
    let len = 4 + 1 + 1 + 2 + addr_size + addr_size;
    let header = cache.read_bytes(addr, len as u64)?;
    let header = header.as_slice();

    if header[0..4] != TREE_MAGIC {
        return Err(Error::corrupt("B-tree node missing TREE magic"));
    }

    let node_type = header[4];
    let node_level = header[5];
    let entries_used = read_field(header, 6, 2)? as u16;
    let body_start = (8 + 2 * addr_size) as u64;

    Ok((node_type, node_level, entries_used, addr + body_start))
}

/// Recursively walks a v1 raw-data chunk B-tree (node type 1), returning
/// every leaf key in traversal (left-to-right) order. Spec §5: "The chunk
/// B-tree walker visits chunks in key order."
pub fn read_chunk_btree<S: ByteSource>(cache: &BlockCache<S>, addr: u64, offset_size: u8, num_dimensions: usize) -> Result<Vec<ChunkKey>> {
    let mut out = Vec::new();
    read_chunk_btree_node(cache, addr, offset_size, num_dimensions, &mut out)?;
    Ok(out)
}

fn read_chunk_btree_node<S: ByteSource>(
    cache: &BlockCache<S>,
    addr: u64,
    offset_size: u8,
    num_dimensions: usize,
    out: &mut Vec<ChunkKey>,
) -> Result<()> {
    let (node_type, node_level, entries_used, mut pos) = tree_header(cache, addr, offset_size)?;
    if node_type != BTREE_CHUNK_NODE_TYPE {
        return Err(Error::corrupt(format!("expected chunk B-tree node type {BTREE_CHUNK_NODE_TYPE}, got {node_type}")));
    }

    let key_size = 4 + 4 + 8 * num_dimensions + 8;

    for _ in 0..entries_used {
        let key_bytes = cache.read_bytes(pos, key_size as u64)?;
        let key_bytes = key_bytes.as_slice().to_vec();
        pos += key_size as u64;

        let child_addr_buf = cache.read_bytes(pos, offset_size as u64)?;
        let child_addr = read_field(child_addr_buf.as_slice(), 0, offset_size as usize)?;
        pos += offset_size as u64;

        if node_level == 0 {
            let chunk_size_bytes = read_field(&key_bytes, 0, 4)? as u32;
            let filter_mask = read_field(&key_bytes, 4, 4)? as u32;
            let mut slice = Vec::with_capacity(num_dimensions);
            for d in 0..num_dimensions {
                slice.push(read_field(&key_bytes, 8 + d * 8, 8)?);
            }
            let trailing_zero = read_field(&key_bytes, 8 + num_dimensions * 8, 8)?;
            if trailing_zero != 0 {
                return Err(Error::corrupt("chunk B-tree key trailing field must be zero"));
            }

            out.push(ChunkKey {
                chunk_size_bytes,
                filter_mask,
                slice,
                chunk_addr: child_addr,
            });
        } else {
            read_chunk_btree_node(cache, child_addr, offset_size, num_dimensions, out)?;
        }
    }

    Ok(())
}

/// A resolved symbol table entry: a link name and the object header it points to.
pub struct SymbolEntry {
    pub name: String,
    pub object_header_addr: u64,
}

/// Walks a v1 group B-tree (node type 0) down to its leaf Symbol Table
/// Nodes, resolving each entry's name through `heap`.
pub fn read_group_btree<S: ByteSource>(
    cache: &BlockCache<S>,
    addr: u64,
    offset_size: u8,
    length_size: u8,
    heap: &LocalHeap,
) -> Result<Vec<SymbolEntry>> {
    let mut out = Vec::new();
    read_group_btree_node(cache, addr, offset_size, length_size, heap, &mut out)?;
    Ok(out)
}

fn read_group_btree_node<S: ByteSource>(
    cache: &BlockCache<S>,
    addr: u64,
    offset_size: u8,
    length_size: u8,
    heap: &LocalHeap,
    out: &mut Vec<SymbolEntry>,
) -> Result<()> {
    let (node_type, node_level, entries_used, mut pos) = tree_header(cache, addr, offset_size)?;
    if node_type != BTREE_GROUP_NODE_TYPE {
        return Err(Error::corrupt(format!("expected group B-tree node type {BTREE_GROUP_NODE_TYPE}, got {node_type}")));
    }

    let key_size = length_size as usize;
    for _ in 0..entries_used {
        pos += key_size as u64; // heap-offset key, unused for traversal itself
        let child_addr_buf = cache.read_bytes(pos, offset_size as u64)?;
        let child_addr = read_field(child_addr_buf.as_slice(), 0, offset_size as usize)?;
        pos += offset_size as u64;

        if node_level == 0 {
            read_symbol_table_node(cache, child_addr, offset_size, length_size, heap, out)?;
        } else {
            read_group_btree_node(cache, child_addr, offset_size, length_size, heap, out)?;
        }
    }

    Ok(())
}

fn read_symbol_table_node<S: ByteSource>(
    cache: &BlockCache<S>,
    addr: u64,
    offset_size: u8,
    length_size: u8,
    heap: &LocalHeap,
    out: &mut Vec<SymbolEntry>,
) -> Result<()> {
    let header = cache.read_bytes(addr, 8)?;
    let header = header.as_slice();
    if header[0..4] != SNOD_MAGIC {
        return Err(Error::corrupt("symbol table node missing SNOD magic"));
    }
    let num_symbols = read_field(header, 6, 2)? as usize;

    let entry_size = length_size as usize + offset_size as usize + 4 + 4 + 16;
    let mut pos = addr + 8;
    for _ in 0..num_symbols {
        let entry = cache.read_bytes(pos, entry_size as u64)?;
        let entry = entry.as_slice();
        let name_offset = read_field(entry, 0, length_size as usize)?;
        let object_header_addr = read_field(entry, length_size as usize, offset_size as usize)?;
        out.push(SymbolEntry {
            name: heap.name_at(name_offset)?,
            object_header_addr,
        });
        pos += entry_size as u64;
    }

    Ok(())
}
