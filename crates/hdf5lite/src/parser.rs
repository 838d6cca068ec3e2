use ioblock::{BlockCache, ByteSource, read_field};

use crate::btree::{read_chunk_btree, read_group_btree};
use crate::chunk::{fill_dense, read_chunked};
use crate::constants::{UNDEFINED_ADDRESS, message};
use crate::context::FileContext;
use crate::dataset::{DataType, DatasetDescriptor, FilterEntry, FilterKind, Layout};
use crate::error::{Error, Result};
use crate::fractalheap;
use crate::localheap::LocalHeap;
use crate::objectheader::{RawMessage, parse_link_message, read_messages};

/// Result of a successful `read_dataset` call.
pub struct ReadResult {
    pub data: Vec<u8>,
    pub type_size: u32,
    pub elements: u64,
    pub rows: u64,
    pub cols: u64,
    pub data_type: DataType,
}

/// Splits a dataset path on `/`, discarding a leading empty segment (spec §4.2).
pub fn decompose_path(path: &str) -> Vec<String> {
    path.split('/').filter(|s| !s.is_empty()).map(str::to_owned).collect()
}

pub struct Parser<'a, S: ByteSource> {
    cache: &'a BlockCache<S>,
    ctx: FileContext,
}

impl<'a, S: ByteSource> Parser<'a, S> {
    pub fn new(cache: &'a BlockCache<S>) -> Result<Self> {
        let ctx = FileContext::parse(cache)?;
        Ok(Self { cache, ctx })
    }

    pub fn context(&self) -> FileContext {
        self.ctx
    }

    pub fn read_dataset(&self, path: &str, start_row: u64, num_rows: u64) -> Result<ReadResult> {
        let segments = decompose_path(path);
        let mut highest_level = 0usize;
        let descriptor = self.resolve(self.ctx.root_group_addr, &segments, 0, &mut highest_level)?;

        if !descriptor.is_terminal() {
            return Err(Error::InvalidPath { level: highest_level });
        }

        let dims = descriptor.dims();
        let dim0 = dims.first().copied().unwrap_or(0);
        if start_row + num_rows > dim0 {
            return Err(Error::OutOfRange {
                start: start_row,
                count: num_rows,
                size: dim0,
            });
        }

        let type_size = descriptor
            .type_size_bytes
            .ok_or_else(|| Error::corrupt("dataset missing Datatype message"))?;
        let row_stride: u64 = dims[1..].iter().product::<u64>().max(1);
        let cols = row_stride;
        let elements = num_rows * row_stride;
        let byte_count = elements * type_size as u64;

        let data = match descriptor.layout {
            Some(Layout::Contiguous) => {
                let addr = descriptor.data_address.ok_or_else(|| Error::corrupt("contiguous dataset missing data address"))?;
                let byte_offset = start_row * row_stride * type_size as u64;
                self.cache.read_bytes(addr + byte_offset, byte_count)?.as_slice().to_vec()
            }
            Some(Layout::Compact) => {
                let inline = descriptor.compact_data.as_ref().ok_or_else(|| Error::corrupt("compact dataset missing inline data"))?;
                let byte_offset = (start_row * row_stride * type_size as u64) as usize;
                let byte_count = byte_count as usize;
                inline
                    .get(byte_offset..byte_offset + byte_count)
                    .ok_or_else(|| Error::corrupt("compact dataset read out of inline bounds"))?
                    .to_vec()
            }
            Some(Layout::Chunked) => {
                let mut buffer = vec![0u8; byte_count as usize];
                fill_dense(&mut buffer, &descriptor, type_size, dims.len().max(1));
                let btree_addr = descriptor.chunk_btree_addr.ok_or_else(|| Error::corrupt("chunked dataset missing B-tree address"))?;
                let keys = read_chunk_btree(self.cache, btree_addr, self.ctx.offset_size, dims.len())?;
                read_chunked(self.cache, &keys, &descriptor, start_row, num_rows, row_stride, type_size, &mut buffer)?;
                buffer
            }
            None => return Err(Error::corrupt("dataset has no Data Layout message")),
        };

        Ok(ReadResult {
            data,
            type_size,
            elements,
            rows: num_rows,
            cols,
            data_type: descriptor.data_type.unwrap_or(DataType::Other),
        })
    }

    fn resolve(&self, addr: u64, segments: &[String], level: usize, highest_level: &mut usize) -> Result<DatasetDescriptor> {
        let messages = read_messages(self.cache, addr, self.ctx.offset_size, self.ctx.length_size)?;
        let mut descriptor = DatasetDescriptor::default();
        let mut matched_child: Option<u64> = None;

        for msg in &messages {
            match msg.msg_type {
                message::DATASPACE => self.apply_dataspace(&mut descriptor, msg)?,
                message::DATATYPE => self.apply_datatype(&mut descriptor, msg)?,
                message::FILL_VALUE => self.apply_fill_value(&mut descriptor, msg)?,
                message::DATA_LAYOUT => self.apply_data_layout(&mut descriptor, msg)?,
                message::FILTER_PIPELINE => self.apply_filter_pipeline(&mut descriptor, msg)?,
                message::LINK if level < segments.len() => {
                    let (entry, _) = parse_link_message(&msg.payload, self.ctx.offset_size)?;
                    if entry.name == segments[level] {
                        matched_child = Some(entry.object_header_addr);
                    }
                }
                message::LINK_INFO if level < segments.len() && matched_child.is_none() => {
                    if let Some(addr) = self.find_in_link_info(msg, &segments[level])? {
                        matched_child = Some(addr);
                    }
                }
                message::SYMBOL_TABLE if level < segments.len() && matched_child.is_none() => {
                    if let Some(addr) = self.find_in_symbol_table(msg, &segments[level])? {
                        matched_child = Some(addr);
                    }
                }
                _ => {}
            }
        }

        descriptor.highest_level_reached = *highest_level;

        if level < segments.len() {
            match matched_child {
                Some(child_addr) => {
                    *highest_level = level + 1;
                    self.resolve(child_addr, segments, level + 1, highest_level)
                }
                None => Err(Error::InvalidPath { level }),
            }
        } else {
            Ok(descriptor)
        }
    }

    fn find_in_link_info(&self, msg: &RawMessage, want: &str) -> Result<Option<u64>> {
        let offset_size = self.ctx.offset_size as usize;
        let mut pos = 2usize; // version + flags
        let flags = msg.payload[1];
        if flags & 0x01 != 0 {
            pos += 8; // max creation index
        }
        let heap_addr = read_field(&msg.payload, pos, offset_size)?;
        if heap_addr == UNDEFINED_ADDRESS {
            return Ok(None);
        }

        let mut found = None;
        fractalheap::visit_links(self.cache, heap_addr, self.ctx.offset_size, self.ctx.length_size, |entry| {
            if entry.name == want {
                found = Some(entry.object_header_addr);
            }
            Ok(())
        })?;

        Ok(found)
    }

    fn find_in_symbol_table(&self, msg: &RawMessage, want: &str) -> Result<Option<u64>> {
        let offset_size = self.ctx.offset_size as usize;
        let btree_addr = read_field(&msg.payload, 0, offset_size)?;
        let heap_addr = read_field(&msg.payload, offset_size, offset_size)?;

        let heap = LocalHeap::parse(self.cache, heap_addr, self.ctx.offset_size, self.ctx.length_size)?;
        let entries = read_group_btree(self.cache, btree_addr, self.ctx.offset_size, self.ctx.length_size, &heap)?;

        Ok(entries.into_iter().find(|e| e.name == want).map(|e| e.object_header_addr))
    }

    fn apply_dataspace(&self, descriptor: &mut DatasetDescriptor, msg: &RawMessage) -> Result<()> {
        let buf = &msg.payload;
        let dimensionality = buf[1] as usize;
        if dimensionality > crate::constants::MAX_NDIMS {
            return Err(Error::corrupt("dataspace dimensionality exceeds MAX_NDIMS"));
        }

        let len_size = self.ctx.length_size as usize;
        let mut pos = 8usize;
        descriptor.num_dimensions = dimensionality;
        for d in 0..dimensionality {
            descriptor.dimensions[d] = read_field(buf, pos, len_size)?;
            pos += len_size;
        }

        Ok(())
    }

    fn apply_datatype(&self, descriptor: &mut DatasetDescriptor, msg: &RawMessage) -> Result<()> {
        let buf = &msg.payload;
        let class = buf[0] & 0x0F;
        let size = read_field(buf, 4, 4)? as u32;

        descriptor.data_type = Some(match class {
            0 => DataType::FixedPoint,
            1 => DataType::FloatingPoint,
            3 => DataType::String,
            4 => DataType::BitField,
            _ => DataType::Other,
        });
        descriptor.type_size_bytes = Some(size);

        Ok(())
    }

    fn apply_fill_value(&self, descriptor: &mut DatasetDescriptor, msg: &RawMessage) -> Result<()> {
        let buf = &msg.payload;
        if buf.len() < 4 {
            return Ok(());
        }
        let fill_defined = buf[3];
        if fill_defined == 0 {
            return Ok(());
        }

        let size = read_field(buf, 4, 4)? as usize;
        if size > 8 {
            return Err(Error::corrupt("fill value wider than 8 bytes is not supported (spec §9 open question ii)"));
        }

        descriptor.fill_size = size as u8;
        descriptor.fill_value_bytes[..size].copy_from_slice(&buf[8..8 + size]);

        Ok(())
    }

    fn apply_data_layout(&self, descriptor: &mut DatasetDescriptor, msg: &RawMessage) -> Result<()> {
        let buf = &msg.payload;
        let layout_class = buf[1];
        let addr_size = self.ctx.offset_size as usize;
        let len_size = self.ctx.length_size as usize;

        match layout_class {
            0 => {
                descriptor.layout = Some(Layout::Compact);
                let size = read_field(buf, 2, 2)? as usize;
                descriptor.data_size = Some(size as u64);
                descriptor.compact_data = Some(buf[4..4 + size].to_vec());
            }
            1 => {
                descriptor.layout = Some(Layout::Contiguous);
                let addr = read_field(buf, 2, addr_size)?;
                let size = read_field(buf, 2 + addr_size, len_size)?;
                descriptor.data_address = Some(addr);
                descriptor.data_size = Some(size);
            }
            2 => {
                descriptor.layout = Some(Layout::Chunked);
                let dimensionality = buf[2] as usize; // stored as ndims + 1
                let btree_addr = read_field(buf, 3, addr_size)?;
                descriptor.chunk_btree_addr = Some(btree_addr);

                let mut pos = 3 + addr_size;
                let mut dims = Vec::with_capacity(dimensionality);
                for _ in 0..dimensionality {
                    dims.push(read_field(buf, pos, 4)?);
                    pos += 4;
                }
                let elem_size = dims.pop().unwrap_or(0) as u32;
                descriptor.chunk_element_size = Some(elem_size);
                descriptor.chunk_elements_per_dim = dims;
                descriptor.chunk_buffer_bytes = Some(descriptor.chunk_element_count() * elem_size as u64);
            }
            other => return Err(Error::corrupt(format!("unsupported data layout class {other}"))),
        }

        Ok(())
    }

    fn apply_filter_pipeline(&self, descriptor: &mut DatasetDescriptor, msg: &RawMessage) -> Result<()> {
        let buf = &msg.payload;
        let num_filters = buf[1] as usize;
        let mut pos = 8usize;

        for _ in 0..num_filters {
            let filter_id = read_field(buf, pos, 2)? as u16;
            let num_client_values = read_field(buf, pos + 6, 2)? as usize;
            let name_length = read_field(buf, pos + 4, 2)? as usize;
            pos += 8 + name_length;

            let mut params = Vec::with_capacity(num_client_values);
            for _ in 0..num_client_values {
                params.push(read_field(buf, pos, 4)? as u32);
                pos += 4;
            }

            let kind = match filter_id {
                crate::constants::filter_id::DEFLATE => Some(FilterKind::Deflate),
                crate::constants::filter_id::SHUFFLE => Some(FilterKind::Shuffle),
                _ => None,
            };

            if let Some(kind) = kind {
                descriptor.filters.push(FilterEntry { kind, params });
            }
        }

        if descriptor.has_filter(FilterKind::Deflate) || descriptor.has_filter(FilterKind::Shuffle) {
            if descriptor.layout != Some(Layout::Chunked) {
                return Err(Error::corrupt("filter pipeline present on a non-chunked dataset"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod fixtures {
    use crate::constants::{HEAP_MAGIC, SIGNATURE, SNOD_MAGIC, TREE_MAGIC};

    const OFFSET_SIZE: usize = 8;
    const LENGTH_SIZE: usize = 8;

    fn le(v: u64, size: usize) -> Vec<u8> {
        v.to_le_bytes()[..size].to_vec()
    }

    fn v1_header(messages: &[(u16, Vec<u8>)]) -> Vec<u8> {
        let mut buf = vec![1u8, 0];
        buf.extend_from_slice(&(messages.len() as u16).to_le_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        for (t, p) in messages {
            buf.extend_from_slice(&t.to_le_bytes());
            buf.extend_from_slice(&(p.len() as u16).to_le_bytes());
            buf.extend_from_slice(&[0u8; 4]);
            buf.extend_from_slice(p);
        }
        buf
    }

    fn dataspace_message(dims: &[u64]) -> Vec<u8> {
        let mut buf = vec![1u8, dims.len() as u8, 0, 0, 0, 0, 0, 0];
        for d in dims {
            buf.extend_from_slice(&le(*d, LENGTH_SIZE));
        }
        buf
    }

    fn datatype_message(class: u8, size: u32) -> Vec<u8> {
        let mut buf = vec![class, 0, 0, 0];
        buf.extend_from_slice(&size.to_le_bytes());
        buf
    }

    fn fill_value_message_undefined() -> Vec<u8> {
        vec![2, 0, 0, 0]
    }

    fn contiguous_layout_message(addr: u64, size: u64) -> Vec<u8> {
        let mut buf = vec![3u8, 1];
        buf.extend_from_slice(&le(addr, OFFSET_SIZE));
        buf.extend_from_slice(&le(size, LENGTH_SIZE));
        buf
    }

    fn chunked_layout_message(btree_addr: u64, chunk_dims: &[u32], elem_size: u32) -> Vec<u8> {
        let mut buf = vec![3u8, 2, (chunk_dims.len() + 1) as u8];
        buf.extend_from_slice(&le(btree_addr, OFFSET_SIZE));
        for d in chunk_dims {
            buf.extend_from_slice(&d.to_le_bytes());
        }
        buf.extend_from_slice(&elem_size.to_le_bytes());
        buf
    }

    fn filter_pipeline_message(filter_ids: &[u16]) -> Vec<u8> {
        let mut buf = vec![1u8, filter_ids.len() as u8, 0, 0, 0, 0, 0, 0];
        for id in filter_ids {
            buf.extend_from_slice(&id.to_le_bytes());
            buf.extend_from_slice(&0u16.to_le_bytes()); // unused by the reader
            buf.extend_from_slice(&0u16.to_le_bytes()); // name_length
            buf.extend_from_slice(&0u16.to_le_bytes()); // num_client_values
        }
        buf
    }

    fn superblock(root_group_addr: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&SIGNATURE);
        buf.push(0); // superblock version
        buf.push(0); // free space storage version
        buf.push(0); // root group symbol table version
        buf.push(0); // reserved
        buf.push(0); // shared header message format version
        buf.push(OFFSET_SIZE as u8);
        buf.push(LENGTH_SIZE as u8);
        buf.push(0);
        buf.extend_from_slice(&4u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        for _ in 0..4 {
            buf.extend_from_slice(&vec![0u8; OFFSET_SIZE]);
        }
        buf.extend_from_slice(&vec![0u8; OFFSET_SIZE]); // link name offset
        buf.extend_from_slice(&le(root_group_addr, OFFSET_SIZE));
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        buf
    }

    /// Builds a single-dataset HDF5 image: root group -> local heap + group
    /// B-tree + one Symbol Table Node -> dataset object header, with the
    /// dataset named `name`.
    ///
    /// `build_extra` runs first against the same buffer the rest of the
    /// image is built in, so it can append whatever raw data or B-tree nodes
    /// the dataset's layout message needs to reference and return the
    /// resulting Data Layout / Filter Pipeline messages at real addresses.
    pub fn build_image(
        name: &str,
        dataspace_dims: &[u64],
        datatype_class: u8,
        elem_size: u32,
        build_extra: impl FnOnce(&mut Vec<u8>) -> Vec<(u16, Vec<u8>)>,
    ) -> (Vec<u8>, u64) {
        let mut buf = vec![0u8; 96]; // reserved for superblock, patched at the end
        let extra = build_extra(&mut buf);

        let mut dataset_messages = vec![
            (crate::constants::message::DATASPACE, dataspace_message(dataspace_dims)),
            (crate::constants::message::DATATYPE, datatype_message(datatype_class, elem_size)),
            (crate::constants::message::FILL_VALUE, fill_value_message_undefined()),
        ];
        dataset_messages.extend(extra);

        let dataset_addr = buf.len() as u64;
        buf.extend_from_slice(&v1_header(&dataset_messages));

        let heap_addr = buf.len() as u64;
        let name_bytes = {
            let mut n = name.as_bytes().to_vec();
            n.push(0);
            n
        };
        let heap_prefix_len = 4 + 1 + 3 + LENGTH_SIZE + LENGTH_SIZE + OFFSET_SIZE;
        let data_seg_addr = heap_addr + heap_prefix_len as u64;
        let mut heap = Vec::new();
        heap.extend_from_slice(&HEAP_MAGIC);
        heap.push(0); // version
        heap.extend_from_slice(&[0u8; 3]); // reserved
        heap.extend_from_slice(&le(0, LENGTH_SIZE)); // free list head (unused by parser)
        heap.extend_from_slice(&le(name_bytes.len() as u64, LENGTH_SIZE)); // data segment size
        heap.extend_from_slice(&le(data_seg_addr, OFFSET_SIZE));
        heap.extend_from_slice(&name_bytes);
        buf.extend_from_slice(&heap);

        let snod_addr = buf.len() as u64;
        let mut snod = Vec::new();
        snod.extend_from_slice(&SNOD_MAGIC);
        snod.push(1); // version
        snod.push(0); // reserved
        snod.extend_from_slice(&1u16.to_le_bytes()); // num_symbols
        snod.extend_from_slice(&le(0, LENGTH_SIZE)); // name_offset into heap (the name starts at offset 0)
        snod.extend_from_slice(&le(dataset_addr, OFFSET_SIZE));
        snod.extend_from_slice(&0u32.to_le_bytes());
        snod.extend_from_slice(&0u32.to_le_bytes());
        snod.extend_from_slice(&[0u8; 16]);
        buf.extend_from_slice(&snod);

        let btree_addr = buf.len() as u64;
        let mut btree = Vec::new();
        btree.extend_from_slice(&TREE_MAGIC);
        btree.push(0); // node type: group
        btree.push(0); // node level: leaf
        btree.extend_from_slice(&1u16.to_le_bytes()); // entries used
        btree.extend_from_slice(&le(u64::MAX, OFFSET_SIZE)); // left sibling
        btree.extend_from_slice(&le(u64::MAX, OFFSET_SIZE)); // right sibling
        btree.extend_from_slice(&le(0, LENGTH_SIZE)); // heap-offset key (unused by reader)
        btree.extend_from_slice(&le(snod_addr, OFFSET_SIZE));
        buf.extend_from_slice(&btree);

        let root_addr = buf.len() as u64;
        let mut sym_table_payload = Vec::new();
        sym_table_payload.extend_from_slice(&le(btree_addr, OFFSET_SIZE));
        sym_table_payload.extend_from_slice(&le(heap_addr, OFFSET_SIZE));
        let root_header = v1_header(&[(crate::constants::message::SYMBOL_TABLE, sym_table_payload)]);
        buf.extend_from_slice(&root_header);

        let sb = superblock(root_addr);
        buf[..sb.len()].copy_from_slice(&sb);

        (buf, dataset_addr)
    }

    pub fn contiguous_data_section(buf: &mut Vec<u8>, values: &[f32]) -> (u64, u64) {
        let addr = buf.len() as u64;
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let size = bytes.len() as u64;
        buf.extend_from_slice(&bytes);
        (addr, size)
    }

    pub fn layout_message_contiguous(addr: u64, size: u64) -> (u16, Vec<u8>) {
        (crate::constants::message::DATA_LAYOUT, contiguous_layout_message(addr, size))
    }

    pub fn layout_message_chunked(btree_addr: u64, chunk_dims: &[u32], elem_size: u32) -> (u16, Vec<u8>) {
        (crate::constants::message::DATA_LAYOUT, chunked_layout_message(btree_addr, chunk_dims, elem_size))
    }

    pub fn filter_message(filter_ids: &[u16]) -> (u16, Vec<u8>) {
        (crate::constants::message::FILTER_PIPELINE, filter_pipeline_message(filter_ids))
    }

    pub fn chunk_btree_leaf(buf: &mut Vec<u8>, chunk_size_bytes: u32, slice: &[u64], chunk_addr: u64) -> u64 {
        let addr = buf.len() as u64;
        buf.extend_from_slice(&TREE_MAGIC);
        buf.push(1); // node type: chunk
        buf.push(0); // node level: leaf
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&le(u64::MAX, OFFSET_SIZE));
        buf.extend_from_slice(&le(u64::MAX, OFFSET_SIZE));
        buf.extend_from_slice(&chunk_size_bytes.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // filter mask
        for s in slice {
            buf.extend_from_slice(&le(*s, 8));
        }
        buf.extend_from_slice(&le(0, 8)); // trailing zero field
        buf.extend_from_slice(&le(chunk_addr, OFFSET_SIZE));
        addr
    }
}
