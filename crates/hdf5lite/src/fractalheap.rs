use ioblock::{BlockCache, ByteSource, read_field};

use crate::constants::{FHDB_MAGIC, FHIB_MAGIC, FRHP_MAGIC, UNDEFINED_ADDRESS};
use crate::error::{Error, Result};
use crate::objectheader::LinkEntry;
use crate::objectheader::parse_link_message;

struct FractalHeapHeader {
    table_width: u16,
    starting_block_size: u64,
    max_direct_block_size: u64,
    root_block_addr: u64,
    curr_rows_root_indirect: u16,
    num_managed_objects: u64,
}

fn parse_header<S: ByteSource>(cache: &BlockCache<S>, addr: u64, offset_size: u8, length_size: u8) -> Result<FractalHeapHeader> {
    let addr_size = offset_size as usize;
    let len_size = length_size as usize;

    // Trimmed v0 FRHP header: enough fields to locate the root block and
    // the managed-object count, skipping huge/tiny/filter bookkeeping this
    // crate never needs because only small link counts are in scope.
    let fixed_len = 4 + 1 + 2 + 2 + 1 + 4 + len_size + addr_size + len_size + addr_size + len_size + len_size + len_size + len_size;
    let block = cache.read_bytes(addr, fixed_len as u64)?;
    let buf = block.as_slice();

    if buf[0..4] != FRHP_MAGIC {
        return Err(Error::corrupt("fractal heap missing FRHP magic"));
    }

    let num_managed_objects_off = 4 + 1 + 2 + 2 + 1 + 4 + len_size + addr_size + len_size + addr_size + len_size + len_size;
    let num_managed_objects = read_field(buf, num_managed_objects_off, len_size)?;

    let tail_off = num_managed_objects_off + len_size + len_size + len_size + len_size + len_size;
    let tail_len = 2 + len_size + len_size + 2 + 2 + addr_size + 2;
    let tail = cache.read_bytes(addr + tail_off as u64, tail_len as u64)?;
    let tail = tail.as_slice();

    let table_width = read_field(tail, 0, 2)? as u16;
    let starting_block_size = read_field(tail, 2, len_size)?;
    let max_direct_block_size = read_field(tail, 2 + len_size, len_size)?;
    let root_block_addr_off = 2 + len_size + len_size + 2 + 2;
    let root_block_addr = read_field(tail, root_block_addr_off, addr_size)?;
    let curr_rows_root_indirect = read_field(tail, root_block_addr_off + addr_size, 2)? as u16;

    Ok(FractalHeapHeader {
        table_width,
        starting_block_size,
        max_direct_block_size,
        root_block_addr,
        curr_rows_root_indirect,
        num_managed_objects,
    })
}

/// Walks a fractal heap's managed objects, decoding each as a Link message
/// and invoking `visit` with the resulting `(name, object_header_addr)`.
pub fn visit_links<S: ByteSource>(
    cache: &BlockCache<S>,
    heap_addr: u64,
    offset_size: u8,
    length_size: u8,
    mut visit: impl FnMut(LinkEntry) -> Result<()>,
) -> Result<()> {
    let header = parse_header(cache, heap_addr, offset_size, length_size)?;

    if header.root_block_addr == UNDEFINED_ADDRESS {
        return Ok(());
    }

    if header.curr_rows_root_indirect == 0 {
        visit_direct_block(
            cache,
            header.root_block_addr,
            header.starting_block_size,
            header.num_managed_objects,
            offset_size,
            &mut visit,
        )
    } else {
        visit_indirect_block(
            cache,
            header.root_block_addr,
            header.table_width,
            header.starting_block_size,
            header.max_direct_block_size,
            header.num_managed_objects,
            offset_size,
            &mut visit,
        )
    }
}

fn visit_direct_block<S: ByteSource>(
    cache: &BlockCache<S>,
    addr: u64,
    block_size: u64,
    max_objects: u64,
    offset_size: u8,
    visit: &mut impl FnMut(LinkEntry) -> Result<()>,
) -> Result<()> {
    // FHDB prefix: magic(4) + version(1) + heap_header_addr(offset_size) +
    // block_offset(variable, sized to fit block_size; approximated here to
    // offset_size for simplicity since this heap is only used for small,
    // single-block link sets).
    let prefix_len = 4 + 1 + offset_size as usize + offset_size as usize;
    let block = cache.read_bytes(addr, block_size)?;
    let buf = block.as_slice();

    if buf[0..4] != FHDB_MAGIC {
        return Err(Error::corrupt("fractal heap direct block missing FHDB magic"));
    }

    let mut pos = prefix_len;
    let mut seen = 0u64;
    while pos < buf.len() && seen < max_objects {
        if buf[pos] == 0 {
            break;
        }

        let (entry, consumed) = parse_link_message(&buf[pos..], offset_size)?;
        visit(entry)?;
        pos += consumed;
        seen += 1;
    }

    Ok(())
}

fn visit_indirect_block<S: ByteSource>(
    cache: &BlockCache<S>,
    addr: u64,
    table_width: u16,
    starting_block_size: u64,
    max_direct_block_size: u64,
    max_objects: u64,
    offset_size: u8,
    visit: &mut impl FnMut(LinkEntry) -> Result<()>,
) -> Result<()> {
    let prefix_len = 4 + 1 + offset_size as usize + offset_size as usize;
    let header = cache.read_bytes(addr, prefix_len as u64)?;
    if header.as_slice()[0..4] != FHIB_MAGIC {
        return Err(Error::corrupt("fractal heap indirect block missing FHIB magic"));
    }

    let mut remaining = max_objects;
    let mut block_size = starting_block_size;
    for slot in 0..table_width {
        if remaining == 0 {
            break;
        }
        let entry_off = prefix_len + slot as usize * offset_size as usize;
        let entry = cache.read_bytes(addr, (entry_off + offset_size as usize) as u64)?;
        let child_addr = read_field(entry.as_slice(), entry_off, offset_size as usize)?;
        if child_addr != UNDEFINED_ADDRESS {
            visit_direct_block(cache, child_addr, block_size, remaining, offset_size, visit)?;
        }
        if block_size < max_direct_block_size {
            block_size *= 2;
        }
        remaining = remaining.saturating_sub(table_width as u64);
    }

    Ok(())
}
