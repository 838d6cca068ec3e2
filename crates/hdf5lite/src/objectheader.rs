use ioblock::{BlockCache, ByteSource, read_field};

use crate::constants::{OCHK_MAGIC, OHDR_V1_PREFIX, OHDR_V2_MAGIC, message};
use crate::error::{Error, Result};

/// One decoded object-header message: its type id and raw payload bytes.
pub struct RawMessage {
    pub msg_type: u16,
    pub payload: Vec<u8>,
}

/// A Link message's essential content: the child name and the address of
/// the object header it points to (hard links only — the corpus this
/// parser targets never uses soft/external links).
pub struct LinkEntry {
    pub name: String,
    pub object_header_addr: u64,
}

/// Parses a Link message payload starting at `buf[0]`. Returns the decoded
/// entry and the number of bytes consumed, so callers (object-header
/// iteration and fractal-heap direct-block replay, which both carry raw
/// Link messages) can advance a cursor.
///
/// Layout: version(1) + flags(1) + name_length(u16 LE) + name(name_length
/// bytes) + object_header_address(offset_size bytes). `flags` bit 0 marks a
/// creation-order field (8 bytes) present directly after the header.
pub fn parse_link_message(buf: &[u8], offset_size: u8) -> Result<(LinkEntry, usize)> {
    if buf.len() < 4 {
        return Err(Error::corrupt("link message truncated"));
    }

    let flags = buf[1];
    let mut pos = 2usize;
    if flags & 0x01 != 0 {
        pos += 8; // creation order
    }

    let name_len = read_field(buf, pos, 2)? as usize;
    pos += 2;

    if buf.len() < pos + name_len + offset_size as usize {
        return Err(Error::corrupt("link message payload shorter than declared name length"));
    }

    let name = String::from_utf8_lossy(&buf[pos..pos + name_len]).into_owned();
    pos += name_len;

    let object_header_addr = read_field(buf, pos, offset_size as usize)?;
    pos += offset_size as usize;

    Ok((LinkEntry { name, object_header_addr }, pos))
}

/// Reads every message reachable from the object header at `addr`,
/// transparently following `HEADER_CONT` redirections and returning to the
/// original stream afterward (spec §4.2). Reads message headers and
/// payloads directly off the block cache at absolute offsets rather than
/// pre-fetching a whole chunk, since the chunk's total length is only
/// known precisely for v2 headers.
pub fn read_messages<S: ByteSource>(cache: &BlockCache<S>, addr: u64, offset_size: u8, length_size: u8) -> Result<Vec<RawMessage>> {
    let probe = cache.read_bytes(addr, 4)?;
    let first_byte = probe.as_slice()[0];

    let mut out = Vec::new();
    if first_byte == OHDR_V1_PREFIX {
        let prefix = cache.read_bytes(addr, 8)?;
        let num_messages = read_field(prefix.as_slice(), 2, 2)? as usize;
        let mut remaining = num_messages;
        read_v1_messages(cache, addr + 8, offset_size, length_size, &mut remaining, &mut out)?;
    } else {
        if probe.as_slice() != OHDR_V2_MAGIC {
            return Err(Error::corrupt("object header missing v1 prefix byte and OHDR magic"));
        }

        let header = cache.read_bytes(addr, 6)?;
        let flags = header.as_slice()[5];
        let attr_order_tracked = flags & 0x04 != 0;
        let times_present = flags & 0x20 != 0;
        let phase_change_present = flags & 0x10 != 0;
        let chunk0_size_width = 1usize << (flags & 0x03);

        let mut pos = addr + 6;
        if times_present {
            pos += 16;
        }
        if phase_change_present {
            pos += 4;
        }

        let size_field = cache.read_bytes(pos, chunk0_size_width as u64)?;
        let chunk0_size = read_field(size_field.as_slice(), 0, chunk0_size_width)?;
        pos += chunk0_size_width as u64;

        read_v2_messages(cache, pos, pos + chunk0_size - 4, offset_size, length_size, attr_order_tracked, &mut out)?;
    }

    Ok(out)
}

fn read_v1_messages<S: ByteSource>(
    cache: &BlockCache<S>,
    mut pos: u64,
    offset_size: u8,
    length_size: u8,
    remaining: &mut usize,
    out: &mut Vec<RawMessage>,
) -> Result<()> {
    while *remaining > 0 {
        let header = cache.read_bytes(pos, 8)?;
        let header = header.as_slice();
        let msg_type = read_field(header, 0, 2)? as u16;
        let msg_size = read_field(header, 2, 2)? as usize;
        pos += 8;

        let payload = cache.read_bytes(pos, msg_size as u64)?.as_slice().to_vec();
        pos += msg_size as u64;
        *remaining -= 1;

        if msg_type == message::HEADER_CONT {
            let offset = read_field(&payload, 0, offset_size as usize)?;
            let length = read_field(&payload, offset_size as usize, length_size as usize)?;
            read_v1_messages(cache, offset, offset_size, length_size, remaining, out)?;
            let _ = length; // length bounds the continuation block; count drives termination.
        } else {
            out.push(RawMessage { msg_type, payload });
        }
    }

    Ok(())
}

fn read_v2_messages<S: ByteSource>(
    cache: &BlockCache<S>,
    mut pos: u64,
    limit: u64,
    offset_size: u8,
    length_size: u8,
    attr_order_tracked: bool,
    out: &mut Vec<RawMessage>,
) -> Result<()> {
    while pos + 4 <= limit {
        let header = cache.read_bytes(pos, 4)?;
        let header = header.as_slice();
        let msg_type = header[0] as u16;
        let msg_size = read_field(header, 1, 2)? as usize;
        let mut hdr_len = 4u64;
        if attr_order_tracked {
            hdr_len += 2;
        }
        pos += hdr_len;

        let payload = cache.read_bytes(pos, msg_size as u64)?.as_slice().to_vec();
        pos += msg_size as u64;

        if msg_type == message::HEADER_CONT {
            let offset = read_field(&payload, 0, offset_size as usize)?;
            let length = read_field(&payload, offset_size as usize, length_size as usize)?;
            let cont_header = cache.read_bytes(offset, 4)?;
            if cont_header.as_slice() != OCHK_MAGIC {
                return Err(Error::corrupt("v2 continuation block missing OCHK magic"));
            }
            read_v2_messages(cache, offset + 4, offset + length - 4, offset_size, length_size, attr_order_tracked, out)?;
        } else {
            out.push(RawMessage { msg_type, payload });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_link_message_reads_name_and_address() {
        let mut buf = vec![1u8, 0]; // version, flags (no creation order)
        buf.extend_from_slice(&3u16.to_le_bytes());
        buf.extend_from_slice(b"abc");
        buf.extend_from_slice(&0x1234u64.to_le_bytes()[..8]);

        let (entry, consumed) = parse_link_message(&buf, 8).unwrap();
        assert_eq!(entry.name, "abc");
        assert_eq!(entry.object_header_addr, 0x1234);
        assert_eq!(consumed, buf.len());
    }
}
