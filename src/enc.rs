//! Little-endian integer and LEB128 varint helpers.
//!
//! Everything here works on byte slices. Page bytes can come straight out of
//! a memory map, so nothing assumes the slice is aligned for the integer
//! being read.

use std::convert::TryInto;

/// Maximum number of bytes a LEB128 encoded u64 can take.
pub const MAX_VARINT_LEN: usize = 10;

#[inline(always)]
pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap_or([0; 2]))
}

#[inline(always)]
pub fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap_or([0; 4]))
}

#[inline(always)]
pub fn read_u64(buf: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap_or([0; 8]))
}

#[inline(always)]
pub fn write_u16(buf: &mut [u8], offset: usize, v: u16) {
    buf[offset..offset + 2].copy_from_slice(&v.to_le_bytes());
}

#[inline(always)]
pub fn write_u32(buf: &mut [u8], offset: usize, v: u32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}

#[inline(always)]
pub fn write_u64(buf: &mut [u8], offset: usize, v: u64) {
    buf[offset..offset + 8].copy_from_slice(&v.to_le_bytes());
}

/// Number of bytes `put_uvarint` will use for `v`.
#[inline]
pub fn uvarint_len(v: u64) -> usize {
    let bits = 64 - (v | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Appends `v` as LEB128 and returns the number of bytes written.
///
/// Based on: https://github.com/google/leveldb/blob/master/util/coding.cc
#[inline]
pub fn put_uvarint(out: &mut Vec<u8>, v: u64) -> usize {
    let mut value = v;
    let mut written = 1;
    while value > 127 {
        out.push((value as u8) | 128);
        value >>= 7;
        written += 1;
    }
    out.push(value as u8);
    written
}

/// Decodes a LEB128 value from the front of `buf`.
///
/// Returns the value and the number of bytes consumed, or `None` when the
/// buffer ends mid-value or the value overflows 64 bits.
#[inline]
pub fn get_uvarint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut val: u64 = 0;
    let mut shift = 0;
    for (i, &b) in buf.iter().enumerate().take(MAX_VARINT_LEN) {
        if i == MAX_VARINT_LEN - 1 && b > 1 {
            return None;
        }
        val |= ((b & 0x7f) as u64) << shift;
        if b < 128 {
            return Some((val, i + 1));
        }
        shift += 7;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    const TEST_NUMBERS: [u64; 14] = [0,
                                     1,
                                     127,
                                     128,
                                     255,
                                     256,
                                     4095,
                                     4096,
                                     16383,
                                     16384,
                                     4294967295,
                                     4294967296,
                                     72057594037927935,
                                     u64::max_value()];

    #[quickcheck]
    fn can_encode_and_decode_int32(sut: u32) {
        let mut target = [0 as u8; 7];
        write_u32(&mut target, 3, sut);
        assert_eq!(read_u32(&target, 3), sut);
    }

    #[quickcheck]
    fn can_encode_and_decode_leb64(sut: u64) {
        let mut target = vec![];
        let n = put_uvarint(&mut target, sut);
        assert_eq!(n, target.len());
        assert_eq!(n, uvarint_len(sut));
        assert_eq!(get_uvarint(&target), Some((sut, n)));
    }

    #[test]
    fn leb_boundaries() {
        let expected_lens = [1, 1, 1, 2, 2, 2, 2, 2, 2, 3, 5, 5, 8, 10];
        for (sut, len) in TEST_NUMBERS.iter().zip(expected_lens.iter()) {
            let mut target = vec![];
            assert_eq!(put_uvarint(&mut target, *sut), *len, "value {}", sut);
            assert_eq!(get_uvarint(&target), Some((*sut, *len)));
        }
    }

    #[test]
    fn truncated_varint_is_rejected() {
        let mut target = vec![];
        put_uvarint(&mut target, 300);
        assert_eq!(get_uvarint(&target[..1]), None);
        assert_eq!(get_uvarint(&[]), None);
        // eleven continuation bytes never terminate
        assert_eq!(get_uvarint(&[0xff; 11]), None);
    }
}
