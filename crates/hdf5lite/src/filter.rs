use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{Error, Result};

/// Inverts the HDF5 shuffle filter. Given `data` holding `N = data.len() /
/// elem_size` elements of `elem_size` bytes each, byte-planed as
/// `[all byte 0s][all byte 1s]...`, reassembles the original interleaved
/// element layout.
///
/// Spec §4.2: "the output byte at `(e*T + b)` is the input byte at `(b*B + e)`"
/// with `B = N` (the element count, i.e. the shuffle block size).
pub fn unshuffle(data: &[u8], elem_size: usize) -> Result<Vec<u8>> {
    if !(1..=8).contains(&elem_size) {
        return Err(Error::corrupt(format!("shuffle element size {elem_size} out of range [1,8]")));
    }
    if data.len() % elem_size != 0 {
        return Err(Error::corrupt("shuffle input length not a multiple of element size"));
    }

    let n = data.len() / elem_size;
    let mut out = vec![0u8; data.len()];
    for e in 0..n {
        for b in 0..elem_size {
            out[e * elem_size + b] = data[b * n + e];
        }
    }

    Ok(out)
}

/// Applies the HDF5 shuffle filter (the forward direction); used only by
/// tests to validate the involution property (spec §8, I4).
pub fn shuffle(data: &[u8], elem_size: usize) -> Result<Vec<u8>> {
    if !(1..=8).contains(&elem_size) {
        return Err(Error::corrupt(format!("shuffle element size {elem_size} out of range [1,8]")));
    }
    if data.len() % elem_size != 0 {
        return Err(Error::corrupt("shuffle input length not a multiple of element size"));
    }

    let n = data.len() / elem_size;
    let mut out = vec![0u8; data.len()];
    for e in 0..n {
        for b in 0..elem_size {
            out[b * n + e] = data[e * elem_size + b];
        }
    }

    Ok(out)
}

/// Inflates raw DEFLATE (no gzip/zlib wrapper) `input` into a buffer sized
/// exactly to the declared decompressed length.
pub fn inflate(input: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; decompressed_size];
    let mut decompress = Decompress::new(false);
    let status = decompress
        .decompress(input, &mut out, FlushDecompress::Finish)
        .map_err(|_| Error::InflateIncomplete)?;

    if !matches!(status, Status::StreamEnd) || (decompress.total_out() as usize) < decompressed_size {
        return Err(Error::InflateIncomplete);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_unshuffle_is_involution() {
        for elem_size in 1..=8usize {
            let n = 17;
            let data: Vec<u8> = (0..(n * elem_size)).map(|i| (i * 7 + 3) as u8).collect();
            let shuffled = shuffle(&data, elem_size).unwrap();
            let restored = unshuffle(&shuffled, elem_size).unwrap();
            assert_eq!(restored, data, "elem_size={elem_size}");
        }
    }

    #[test]
    fn unshuffle_rejects_bad_elem_size() {
        assert!(unshuffle(&[1, 2, 3, 4], 9).is_err());
        assert!(unshuffle(&[1, 2, 3, 4], 0).is_err());
    }

    #[test]
    fn inflate_round_trips_raw_deflate() {
        use flate2::Compression;
        use flate2::write::DeflateEncoder;
        use std::io::Write;

        let original = b"the quick brown fox jumps over the lazy dog".repeat(4);
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let restored = inflate(&compressed, original.len()).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn inflate_fails_on_truncated_stream() {
        use flate2::Compression;
        use flate2::write::DeflateEncoder;
        use std::io::Write;

        let original = b"some data that compresses to more than one byte of output".repeat(4);
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let truncated = &compressed[..compressed.len() / 2];
        assert!(inflate(truncated, original.len()).is_err());
    }
}
