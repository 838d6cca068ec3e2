use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Positional byte-range source. Implementations must be safe to call from
/// multiple threads concurrently; the block cache serializes access to a
/// given source with its own mutex but does not assume the source itself is
/// lock-free.
pub trait ByteSource: Send + Sync {
    /// Reads exactly `buf.len()` bytes starting at `offset`. A short read is
    /// an error, never a partial fill.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Total length of the source in bytes, when known.
    fn len(&self) -> Option<u64> {
        None
    }
}

/// Reads through a plain file handle. Grounded on
/// `cogtilereader::io::CogHeaderReader`'s pattern of wrapping a single
/// `Read + Seek` stream; here the seek+read pair is serialized behind a
/// mutex so the same handle can back concurrent readers.
pub struct FileByteSource {
    file: Mutex<File>,
    len: u64,
}

impl FileByteSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|cause| Error::IoError { offset: 0, length: 0, cause })?;
        let len = file
            .metadata()
            .map_err(|cause| Error::IoError { offset: 0, length: 0, cause })?
            .len();
        Ok(Self { file: Mutex::new(file), len })
    }
}

impl ByteSource for FileByteSource {
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))
            .map_err(|cause| Error::IoError { offset, length: buf.len() as u64, cause })?;

        let mut filled = 0usize;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(Error::IoShort {
                        offset,
                        requested: buf.len() as u64,
                        got: filled as u64,
                    });
                }
                Ok(n) => filled += n,
                Err(cause) => {
                    return Err(Error::IoError {
                        offset,
                        length: buf.len() as u64,
                        cause,
                    });
                }
            }
        }

        Ok(())
    }

    fn len(&self) -> Option<u64> {
        Some(self.len)
    }
}

/// In-memory backing store, used throughout the test suite so tests never
/// touch the filesystem.
pub struct MemoryByteSource {
    bytes: Vec<u8>,
}

impl MemoryByteSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl ByteSource for MemoryByteSource {
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + buf.len();
        if end > self.bytes.len() {
            let got = self.bytes.len().saturating_sub(start);
            return Err(Error::IoShort {
                offset,
                requested: buf.len() as u64,
                got: got as u64,
            });
        }

        buf.copy_from_slice(&self.bytes[start..end]);
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        Some(self.bytes.len() as u64)
    }
}
