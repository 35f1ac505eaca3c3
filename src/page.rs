use crate::constants::*;
use crate::enc;
use crate::errors::{Error, Result};

// A page number in the database
pub type PageId = u64;

bitflags! {
    /// The below flags are used to represent the page type
    pub struct PageFlags: u16 {
        const BRANCH        = 0x01;
        const LEAF          = 0x02;
        const META          = 0x04;
        const FREELIST      = 0x08;
    }
}

/// Decoded form of the 16 byte header at the start of every page.
///
/// Page layout
///
///    ----------------------------------------------------------------------
///   | pgid (8) | flags (2) | count (2) | overflow (4) | elements | data  |
///    ----------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub id: PageId,
    pub flags: u16,
    pub count: u16,
    pub overflow: u32,
}

impl PageHeader {
    pub fn decode(buf: &[u8]) -> Result<PageHeader> {
        if buf.len() < PAGE_HEADER_SIZE {
            return Err(Error::corrupt(format!("page of {} bytes has no header", buf.len())));
        }
        Ok(PageHeader {
            id: enc::read_u64(buf, 0),
            flags: enc::read_u16(buf, 8),
            count: enc::read_u16(buf, 10),
            overflow: enc::read_u32(buf, 12),
        })
    }

    pub fn encode(&self, buf: &mut [u8]) {
        enc::write_u64(buf, 0, self.id);
        enc::write_u16(buf, 8, self.flags);
        enc::write_u16(buf, 10, self.count);
        enc::write_u32(buf, 12, self.overflow);
    }

    pub fn page_flags(&self) -> PageFlags {
        PageFlags::from_bits_truncate(self.flags)
    }
}

// Writes only the flags and count fields; id and overflow belong to
// whoever allocated the buffer.
pub fn write_flags_and_count(buf: &mut [u8], flags: PageFlags, count: u16) {
    enc::write_u16(buf, 8, flags.bits());
    enc::write_u16(buf, 10, count);
}

// Byte offset of element `index` from the start of the page.
#[inline]
pub fn element_offset(index: usize) -> usize {
    PAGE_HEADER_SIZE + index * LEAF_PAGE_ELEMENT_SIZE
}

// BranchPageElement represents a node on a branch page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchPageElement {
    pub pos: u32,
    pub ksize: u32,
    pub pgid: PageId,
}

impl BranchPageElement {
    pub fn decode(buf: &[u8], offset: usize) -> BranchPageElement {
        BranchPageElement {
            pos: enc::read_u32(buf, offset),
            ksize: enc::read_u32(buf, offset + 4),
            pgid: enc::read_u64(buf, offset + 8),
        }
    }

    pub fn encode(&self, buf: &mut [u8], offset: usize) {
        enc::write_u32(buf, offset, self.pos);
        enc::write_u32(buf, offset + 4, self.ksize);
        enc::write_u64(buf, offset + 8, self.pgid);
    }
}

// leafPageElement represents a node on a leaf page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafPageElement {
    pub flags: u32,
    pub pos: u32,
    pub ksize: u32,
    pub vsize: u32,
}

impl LeafPageElement {
    pub fn decode(buf: &[u8], offset: usize) -> LeafPageElement {
        LeafPageElement {
            flags: enc::read_u32(buf, offset),
            pos: enc::read_u32(buf, offset + 4),
            ksize: enc::read_u32(buf, offset + 8),
            vsize: enc::read_u32(buf, offset + 12),
        }
    }

    pub fn encode(&self, buf: &mut [u8], offset: usize) {
        enc::write_u32(buf, offset, self.flags);
        enc::write_u32(buf, offset + 4, self.pos);
        enc::write_u32(buf, offset + 8, self.ksize);
        enc::write_u32(buf, offset + 12, self.vsize);
    }
}

/// Returns `start..start+len` if it lies inside a buffer of `limit` bytes.
pub fn checked_range(start: usize, len: usize, limit: usize) -> Option<::std::ops::Range<usize>> {
    let end = start.checked_add(len)?;
    if end > limit {
        None
    } else {
        Some(start..end)
    }
}

/// Number of contiguous pages needed to hold `size` bytes; never zero.
#[inline]
pub fn pages_for(size: usize, page_size: usize) -> usize {
    ((size + page_size - 1) / page_size).max(1)
}
