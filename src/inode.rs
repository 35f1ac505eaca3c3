use crate::page::PageId;

bitflags! {
    /// Per-entry flags stored in a leaf element header.
    pub struct InodeFlags: u32 {
        /// The value is a sub-bucket header rather than user data.
        const BUCKET             = 0x01;
        /// The value is the compressed form of the node's whole inode array.
        const COMPRESSED_PAYLOAD = 0x02;
    }
}

// Inode represents an internal node inside of a node.
// It can be used to point to elements in a page or point
// to an element which hasn't been added to a page yet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Inode {
    pub flags: u32,
    pub pgid: PageId,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Inode {
    pub fn new(key: &[u8], value: &[u8], pgid: PageId, flags: u32) -> Inode {
        Inode {
            flags: flags,
            pgid: pgid,
            key: key.to_vec(),
            value: value.to_vec(),
        }
    }

    pub fn inode_flags(&self) -> InodeFlags {
        InodeFlags::from_bits_truncate(self.flags)
    }

    pub fn is_compressed_payload(&self) -> bool {
        self.inode_flags().contains(InodeFlags::COMPRESSED_PAYLOAD)
    }

    // Bytes this entry adds to the key/value region of a page.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

// Index of the first inode whose key is >= `key`.
pub fn search(inodes: &[Inode], key: &[u8]) -> usize {
    match inodes.binary_search_by(|inode| inode.key.as_slice().cmp(key)) {
        Ok(i) | Err(i) => i,
    }
}

// Index of the inode with exactly `key`, if present.
pub fn find(inodes: &[Inode], key: &[u8]) -> Option<usize> {
    inodes.binary_search_by(|inode| inode.key.as_slice().cmp(key)).ok()
}

pub fn is_sorted(inodes: &[Inode]) -> bool {
    inodes.windows(2).all(|w| w[0].key < w[1].key)
}
