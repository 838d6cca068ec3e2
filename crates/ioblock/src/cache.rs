use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::source::ByteSource;

/// Default alignment and size of a cache block, 1 MiB.
pub const IO_BLOCK_SIZE: u64 = 1 << 20;

/// Default maximum number of resident blocks.
pub const IO_CACHE_MAX: usize = 64;

/// One resident, aligned block of bytes read from the underlying source.
#[derive(Debug)]
pub struct CacheEntry {
    pub file_offset: u64,
    pub length: u64,
    pub bytes: Vec<u8>,
}

impl CacheEntry {
    fn contains(&self, offset: u64, length: u64) -> bool {
        self.file_offset <= offset && offset + length <= self.file_offset + self.length
    }
}

/// A view into a cache entry valid for the lifetime of the `Arc` handle; the
/// entry itself may be evicted from the cache after this is taken without
/// invalidating the bytes already handed out, since eviction only drops the
/// cache's own reference.
pub struct CacheSlice {
    entry: Arc<CacheEntry>,
    start: usize,
    end: usize,
}

impl CacheSlice {
    pub fn as_slice(&self) -> &[u8] {
        &self.entry.bytes[self.start..self.end]
    }
}

struct Inner {
    entries: HashMap<u64, Arc<CacheEntry>>,
    insertion_order: VecDeque<u64>,
    capacity: usize,
    block_size: u64,
}

/// Bounded, block-aligned byte cache over a single [`ByteSource`].
///
/// Contract (spec §4.1): on a miss, reads `max(length, block_size)` bytes
/// aligned down to `block_size`; on a short read, fails with
/// [`Error::IoShort`]. Eviction is FIFO on insertion order — a cache hit
/// never reorders an entry, matching the component contract in §4.1 (the
/// data-model description in §3 calls this "LRU on insertion order", which
/// is the same thing when hits never bump position).
pub struct BlockCache<S: ByteSource> {
    source: S,
    inner: Mutex<Inner>,
}

impl<S: ByteSource> BlockCache<S> {
    pub fn new(source: S) -> Self {
        Self::with_capacity(source, IO_CACHE_MAX, IO_BLOCK_SIZE)
    }

    pub fn with_capacity(source: S, capacity: usize, block_size: u64) -> Self {
        assert!(block_size.is_power_of_two(), "block_size must be a power of two");
        Self {
            source,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
                capacity,
                block_size,
            }),
        }
    }

    fn aligned_key(&self, offset: u64, block_size: u64) -> u64 {
        offset - (offset % block_size)
    }

    /// Returns a view of `length` bytes starting at `offset`. Invariant
    /// (spec §8, I1): for the cache entry backing the returned slice,
    /// `entry.offset <= offset` and `offset + length <= entry.offset + entry.length`.
    pub fn read_bytes(&self, offset: u64, length: u64) -> Result<CacheSlice> {
        if length == 0 {
            return Err(Error::InvalidArgument("zero-length read".to_string()));
        }

        let block_size = { self.inner.lock().block_size };
        let key = self.aligned_key(offset, block_size);

        // A request may straddle a block boundary (offset + length extends
        // past key + block_size); the spec's read-through contract only
        // guarantees a cached block covers the request, so grow the read to
        // whatever span is needed starting at the aligned key.
        let span = (offset + length).saturating_sub(key).max(block_size);

        if let Some(entry) = self.lookup(key) {
            if entry.contains(offset, length) {
                return Ok(self.slice_of(entry, offset, length));
            }
        }

        let entry = self.fetch_and_insert(key, span)?;
        if !entry.contains(offset, length) {
            // The request spans more than the single fetched block; fetch a
            // block wide enough to cover it directly rather than stitching
            // multiple cache entries together.
            let wide_entry = self.fetch_uncached(key, span)?;
            return Ok(self.slice_of(Arc::new(wide_entry), offset, length));
        }

        Ok(self.slice_of(entry, offset, length))
    }

    fn lookup(&self, key: u64) -> Option<Arc<CacheEntry>> {
        self.inner.lock().entries.get(&key).cloned()
    }

    fn slice_of(&self, entry: Arc<CacheEntry>, offset: u64, length: u64) -> CacheSlice {
        let start = (offset - entry.file_offset) as usize;
        let end = start + length as usize;
        CacheSlice { entry, start, end }
    }

    fn fetch_uncached(&self, offset: u64, length: u64) -> Result<CacheEntry> {
        let mut bytes = vec![0u8; length as usize];
        match self.source.read_exact_at(offset, &mut bytes) {
            Ok(()) => Ok(CacheEntry { file_offset: offset, length, bytes }),
            Err(Error::IoShort { requested, got, .. }) => Err(Error::IoShort { offset, requested, got }),
            Err(other) => Err(other),
        }
    }

    fn fetch_and_insert(&self, key: u64, span: u64) -> Result<Arc<CacheEntry>> {
        let entry = Arc::new(self.fetch_uncached(key, span)?);

        let mut inner = self.inner.lock();
        if inner.entries.len() >= inner.capacity {
            if let Some(oldest) = inner.insertion_order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
        inner.entries.insert(key, entry.clone());
        inner.insertion_order.push_back(key);

        Ok(entry)
    }
}

/// Reads a little-endian field of `size` bytes (1, 2, 4 or 8) from `buf` at
/// `offset` and returns it widened to `u64` in native byte order. Per spec
/// §4.1: "All endian conversions ... are explicitly little-endian on the
/// wire and native on return."
pub fn read_field(buf: &[u8], offset: usize, size: usize) -> Result<u64> {
    if offset + size > buf.len() {
        return Err(Error::InvalidArgument(format!(
            "read_field: offset {offset} + size {size} exceeds buffer length {}",
            buf.len()
        )));
    }

    let mut raw = [0u8; 8];
    raw[..size].copy_from_slice(&buf[offset..offset + size]);
    Ok(u64::from_le_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryByteSource;

    fn cache_of(len: usize) -> BlockCache<MemoryByteSource> {
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        BlockCache::with_capacity(MemoryByteSource::new(bytes), 4, 64)
    }

    #[test]
    fn read_within_single_block() {
        let cache = cache_of(1024);
        let slice = cache.read_bytes(10, 5).expect("read should succeed");
        assert_eq!(slice.as_slice(), &[10u8, 11, 12, 13, 14]);
    }

    #[test]
    fn containment_invariant_holds_on_hit() {
        let cache = cache_of(1024);
        let _ = cache.read_bytes(0, 4).unwrap();
        let slice = cache.read_bytes(2, 4).unwrap();
        // entry covers [0, 64); request [2, 6) must be inside it.
        assert_eq!(slice.as_slice(), &[2u8, 3, 4, 5]);
    }

    #[test]
    fn short_read_fails() {
        let cache = cache_of(10);
        let err = cache.read_bytes(0, 20).unwrap_err();
        assert!(matches!(err, Error::IoShort { .. }));
    }

    #[test]
    fn fifo_eviction_drops_oldest_entry() {
        let cache = cache_of(64 * 8);
        for i in 0..4 {
            cache.read_bytes(i * 64, 4).unwrap();
        }
        assert_eq!(cache.inner.lock().entries.len(), 4);
        // Fifth distinct block evicts the first.
        cache.read_bytes(4 * 64, 4).unwrap();
        let inner = cache.inner.lock();
        assert_eq!(inner.entries.len(), 4);
        assert!(!inner.entries.contains_key(&0));
    }

    #[test]
    fn read_field_is_little_endian_on_wire() {
        let buf = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(read_field(&buf, 0, 2).unwrap(), 0x0201);
        assert_eq!(read_field(&buf, 0, 4).unwrap(), 0x04030201);
    }
}
