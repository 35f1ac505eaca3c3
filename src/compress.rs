//! Serialization and compression of a leaf's inode array.
//!
//! A compressed leaf stores one synthetic element whose value is a blob:
//!
//! ```ignore
//! | codec (1) | crc32 of payload (4) | lz4 block with its u32 uncompressed length prepended |
//! ```
//!
//! The uncompressed payload is
//!
//! ```ignore
//! | uvarint(count) | { uvarint(ksize) | uvarint(vsize) | flags (4) | key | value }* |
//! ```

use crate::enc;
use crate::errors::{Error, Result};
use crate::inode::{self, Inode};
use crate::page::checked_range;

/// Codec tag for LZ4 block compression. Also recorded in the file header.
pub const CODEC_LZ4: u8 = 1;

// LZ4 cannot expand more than ~255x; anything claiming more is garbage and
// must not drive an allocation.
const MAX_EXPANSION: usize = 255;

/// Serializes inodes into the uncompressed payload form.
pub fn encode_inodes(inodes: &[Inode]) -> Vec<u8> {
    let len = enc::uvarint_len(inodes.len() as u64) +
              inodes.iter()
        .map(|n| {
            enc::uvarint_len(n.key.len() as u64) + enc::uvarint_len(n.value.len() as u64) + 4 +
            n.payload_len()
        })
        .sum::<usize>();
    let mut out = Vec::with_capacity(len);
    enc::put_uvarint(&mut out, inodes.len() as u64);
    for n in inodes {
        enc::put_uvarint(&mut out, n.key.len() as u64);
        enc::put_uvarint(&mut out, n.value.len() as u64);
        out.extend_from_slice(&n.flags.to_le_bytes());
        out.extend_from_slice(&n.key);
        out.extend_from_slice(&n.value);
    }
    debug_assert_eq!(out.len(), len);
    out
}

/// Parses the uncompressed payload back into a sorted inode array.
pub fn decode_inodes(buf: &[u8]) -> Result<Vec<Inode>> {
    let mut cursor = 0;
    let count = take_uvarint(buf, &mut cursor)? as usize;
    // Each entry needs at least 6 bytes, so the count is bounded by the buffer.
    if count > buf.len() / 6 + 1 {
        return Err(Error::corrupt(format!("payload claims {} entries in {} bytes", count, buf.len())));
    }
    let mut inodes = Vec::with_capacity(count);
    for _ in 0..count {
        let ksize = take_uvarint(buf, &mut cursor)? as usize;
        let vsize = take_uvarint(buf, &mut cursor)? as usize;
        let flags = take(buf, &mut cursor, 4).map(|b| enc::read_u32(b, 0))?;
        let key = take(buf, &mut cursor, ksize)?.to_vec();
        let value = take(buf, &mut cursor, vsize)?.to_vec();
        if key.is_empty() {
            return Err(Error::corrupt("compressed payload holds an empty key"));
        }
        inodes.push(Inode {
            flags: flags,
            pgid: 0,
            key: key,
            value: value,
        });
    }
    if cursor != buf.len() {
        return Err(Error::corrupt(format!("{} trailing bytes after compressed payload",
                                          buf.len() - cursor)));
    }
    if !inode::is_sorted(&inodes) {
        return Err(Error::corrupt("compressed payload keys are not sorted"));
    }
    Ok(inodes)
}

// codec tag + payload checksum
const BLOCK_HEADER_SIZE: usize = 5;

/// Compresses `raw` and frames it with the codec tag and a checksum of `raw`.
pub fn compress_block(raw: &[u8]) -> Vec<u8> {
    let packed = lz4_flex::compress_prepend_size(raw);
    let mut out = Vec::with_capacity(packed.len() + BLOCK_HEADER_SIZE);
    out.push(CODEC_LZ4);
    out.extend_from_slice(&crc32fast::hash(raw).to_le_bytes());
    out.extend_from_slice(&packed);
    out
}

/// Reverses `compress_block`.
pub fn decompress_block(blob: &[u8]) -> Result<Vec<u8>> {
    let (codec, packed) = match blob.split_first() {
        Some((codec, packed)) => (*codec, packed),
        None => return Err(Error::corrupt("empty compressed payload")),
    };
    if codec != CODEC_LZ4 {
        return Err(Error::corrupt(format!("unknown compression codec {}", codec)));
    }
    if packed.len() < 8 {
        return Err(Error::corrupt("compressed payload is missing its header"));
    }
    let checksum = enc::read_u32(packed, 0);
    let packed = &packed[4..];
    let claimed = enc::read_u32(packed, 0) as usize;
    if claimed > (packed.len() - 4).saturating_mul(MAX_EXPANSION) + 16 {
        return Err(Error::corrupt(format!("compressed payload claims {} bytes", claimed)));
    }
    let raw = lz4_flex::decompress_size_prepended(packed)
        .map_err(|e| Error::corrupt(format!("lz4 decompression failed: {}", e)))?;
    if crc32fast::hash(&raw) != checksum {
        return Err(Error::corrupt("compressed payload checksum mismatch"));
    }
    Ok(raw)
}

fn take<'a>(buf: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8]> {
    let r = checked_range(*cursor, len, buf.len())
        .ok_or_else(|| Error::corrupt("compressed payload is truncated"))?;
    *cursor = r.end;
    Ok(&buf[r])
}

fn take_uvarint(buf: &[u8], cursor: &mut usize) -> Result<u64> {
    let (v, n) = enc::get_uvarint(&buf[*cursor..])
        .ok_or_else(|| Error::corrupt("bad varint in compressed payload"))?;
    *cursor += n;
    Ok(v)
}
