use crate::arena::NodeId;
use crate::compress;
use crate::constants::*;
use crate::errors::{Error, Result};
use crate::inode::{self, Inode, InodeFlags};
use crate::page::{self, BranchPageElement, LeafPageElement, PageFlags, PageHeader, PageId};

/// The in-memory, mutable counterpart of a leaf or branch page.
///
/// Links to the parent and to materialized children are `NodeId`s into the
/// transaction's `NodeArena`; the node itself never owns another node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) is_leaf: bool,
    pub(crate) unbalanced: bool,
    pub(crate) spilled: bool,
    pub(crate) compressed: bool,
    // First key seen when the node was read. Parents route to this node by it.
    pub(crate) key: Vec<u8>,
    pub(crate) pgid: PageId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) inodes: Vec<Inode>,
}

impl Node {
    /// Creates an empty, unwritten node.
    pub fn new(is_leaf: bool) -> Node {
        Node {
            is_leaf: is_leaf,
            unbalanced: false,
            spilled: false,
            compressed: false,
            key: Vec::new(),
            pgid: 0,
            parent: None,
            children: Vec::new(),
            inodes: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn is_unbalanced(&self) -> bool {
        self.unbalanced
    }

    pub fn is_spilled(&self) -> bool {
        self.spilled
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn pgid(&self) -> PageId {
        self.pgid
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn inodes(&self) -> &[Inode] {
        &self.inodes
    }

    /// Minimum number of inodes before the node counts as underfilled.
    pub fn min_keys(&self) -> usize {
        if self.is_leaf { 1 } else { 2 }
    }

    /// Size of each element header on this node's page.
    #[inline]
    pub fn page_element_size(&self) -> usize {
        if self.is_leaf {
            LEAF_PAGE_ELEMENT_SIZE
        } else {
            BRANCH_PAGE_ELEMENT_SIZE
        }
    }

    /// Exact number of bytes `write` will produce.
    pub fn size(&self) -> usize {
        let elsize = self.page_element_size();
        PAGE_HEADER_SIZE + self.inodes.iter().map(|n| elsize + n.payload_len()).sum::<usize>()
    }

    /// Returns true if the node is smaller than `limit` bytes. Stops counting
    /// as soon as the running total reaches the limit.
    pub fn size_less_than(&self, limit: usize) -> bool {
        let elsize = self.page_element_size();
        let mut sz = PAGE_HEADER_SIZE;
        for n in &self.inodes {
            sz += elsize + n.payload_len();
            if sz >= limit {
                return false;
            }
        }
        sz < limit
    }

    /// Deserializes a leaf or branch page.
    ///
    /// `buf` must cover the whole logical page, overflow pages included. A
    /// compressed leaf is returned as-is with `is_compressed()` set; call
    /// `decompress` before reading its entries.
    pub fn read(buf: &[u8]) -> Result<Node> {
        let hdr = PageHeader::decode(buf)?;
        let is_leaf = match hdr.flags {
            f if f == PageFlags::LEAF.bits() => true,
            f if f == PageFlags::BRANCH.bits() => false,
            _ => {
                return Err(Error::corrupt(format!("page {} has flags {:#x}, expected leaf or branch",
                                                  hdr.id,
                                                  hdr.flags)))
            }
        };

        let count = hdr.count as usize;
        if page::checked_range(PAGE_HEADER_SIZE, count * LEAF_PAGE_ELEMENT_SIZE, buf.len()).is_none() {
            return Err(Error::corrupt(format!("page {} holds {} elements in {} bytes",
                                              hdr.id,
                                              count,
                                              buf.len())));
        }

        let mut node = Node::new(is_leaf);
        node.pgid = hdr.id;
        node.inodes.reserve(count);
        for i in 0..count {
            let off = page::element_offset(i);
            let inode = if is_leaf {
                let elem = LeafPageElement::decode(buf, off);
                let key = element_range(buf, off + elem.pos as usize, elem.ksize, hdr.id)?;
                let value = element_range(buf, key.end, elem.vsize, hdr.id)?;
                Inode {
                    flags: elem.flags,
                    pgid: 0,
                    key: buf[key].to_vec(),
                    value: buf[value].to_vec(),
                }
            } else {
                let elem = BranchPageElement::decode(buf, off);
                if elem.pgid == 0 {
                    return Err(Error::corrupt(format!("branch page {} element {} points at page 0",
                                                      hdr.id,
                                                      i)));
                }
                let key = element_range(buf, off + elem.pos as usize, elem.ksize, hdr.id)?;
                Inode {
                    flags: 0,
                    pgid: elem.pgid,
                    key: buf[key].to_vec(),
                    value: Vec::new(),
                }
            };
            if inode.key.is_empty() {
                return Err(Error::corrupt(format!("page {} element {} has an empty key", hdr.id, i)));
            }
            if inode.is_compressed_payload() && count != 1 {
                return Err(Error::corrupt(format!("page {} mixes a compressed payload with {} other \
                                                   elements",
                                                  hdr.id,
                                                  count - 1)));
            }
            node.inodes.push(inode);
        }

        node.compressed = node.inodes.len() == 1 && node.inodes[0].is_compressed_payload();
        node.key = match node.inodes.first() {
            Some(first) => first.key.clone(),
            None => Vec::new(),
        };
        Ok(node)
    }

    /// Serializes the node into `buf` and returns the number of bytes used.
    ///
    /// Only the flags and count fields of the header are written; the page id
    /// and overflow count belong to whoever allocated `buf`.
    pub fn write(&self, buf: &mut [u8]) -> Result<usize> {
        let size = self.size();
        if buf.len() < size {
            return Err(Error::BufferTooSmall {
                needed: size,
                available: buf.len(),
            });
        }
        let count = self.inodes.len();
        if count > u16::max_value() as usize {
            return Err(Error::TooManyEntries(count));
        }

        let flags = if self.is_leaf {
            PageFlags::LEAF
        } else {
            PageFlags::BRANCH
        };
        page::write_flags_and_count(buf, flags, count as u16);

        // Keys and values go after the element headers.
        let mut cursor = page::element_offset(count);
        for (i, inode) in self.inodes.iter().enumerate() {
            let off = page::element_offset(i);
            let pos = (cursor - off) as u32;
            if self.is_leaf {
                LeafPageElement {
                        flags: inode.flags,
                        pos: pos,
                        ksize: inode.key.len() as u32,
                        vsize: inode.value.len() as u32,
                    }
                    .encode(buf, off);
            } else {
                BranchPageElement {
                        pos: pos,
                        ksize: inode.key.len() as u32,
                        pgid: inode.pgid,
                    }
                    .encode(buf, off);
            }
            buf[cursor..cursor + inode.key.len()].copy_from_slice(&inode.key);
            cursor += inode.key.len();
            buf[cursor..cursor + inode.value.len()].copy_from_slice(&inode.value);
            cursor += inode.value.len();
        }
        debug_assert_eq!(cursor, size);
        Ok(cursor)
    }

    /// Inserts or overwrites an entry.
    ///
    /// If an entry keyed `old_key` exists it is rewritten in place (which is
    /// how a parent renames its routing key for a child), otherwise a new entry
    /// is inserted at its sorted position.
    pub fn put(&mut self, old_key: &[u8], new_key: &[u8], value: &[u8], pgid: PageId, flags: u32) {
        assert!(!old_key.is_empty(), "put: zero-length old key");
        assert!(!new_key.is_empty(), "put: zero-length new key");
        assert!(new_key.len() <= MAX_KEY_SIZE, "put: key too large");
        assert!(value.len() <= MAX_VALUE_SIZE, "put: value too large");
        assert!(!self.compressed, "put: node must be decompressed first");
        assert!(flags & InodeFlags::COMPRESSED_PAYLOAD.bits() == 0,
                "put: compressed payload flag is reserved");

        let index = inode::search(&self.inodes, old_key);
        let exact = index < self.inodes.len() && self.inodes[index].key.as_slice() == old_key;
        if !exact {
            self.inodes.insert(index, Inode::default());
        }

        let inode = &mut self.inodes[index];
        inode.flags = flags;
        inode.key = new_key.to_vec();
        inode.value = value.to_vec();
        inode.pgid = pgid;
        debug_assert!(inode::is_sorted(&self.inodes), "put: rename broke key order");
    }

    /// Removes the entry for `key`, if any, and marks the node unbalanced.
    pub fn del(&mut self, key: &[u8]) {
        assert!(!self.compressed, "del: node must be decompressed first");
        if let Some(index) = inode::find(&self.inodes, key) {
            self.inodes.remove(index);
            self.unbalanced = true;
        }
    }

    // Index at which to cut the node so the left side stays under
    // `threshold` bytes while both sides keep `MIN_KEYS_PER_PAGE` entries.
    // Nodes too small to cut return their length.
    pub(crate) fn split_index(&self, threshold: usize) -> usize {
        let len = self.inodes.len();
        if len <= MIN_KEYS_PER_PAGE * 2 {
            return len;
        }
        let elsize = self.page_element_size();
        let mut sz = PAGE_HEADER_SIZE;
        for (i, inode) in self.inodes.iter().enumerate().take(len - MIN_KEYS_PER_PAGE + 1) {
            let inode_size = elsize + inode.payload_len();
            if i >= MIN_KEYS_PER_PAGE && sz + inode_size > threshold {
                return i;
            }
            sz += inode_size;
        }
        len - MIN_KEYS_PER_PAGE
    }

    // Cuts the node once if it is larger than `limit` and returns the right
    // half. Links are left for the arena to fix up.
    pub(crate) fn split_two(&mut self, limit: usize, threshold: usize) -> Option<Node> {
        // A node of exactly `limit` bytes still fits.
        if self.inodes.len() <= MIN_KEYS_PER_PAGE * 2 || self.size_less_than(limit + 1) {
            return None;
        }
        let index = self.split_index(threshold);
        let mut next = Node::new(self.is_leaf);
        next.inodes = self.inodes.split_off(index);
        Some(next)
    }

    /// Replaces the leaf's entries with a single compressed entry if the
    /// resulting node is strictly smaller than `budget` bytes.
    ///
    /// On `Err(NotCompressed)` the node is left exactly as it was.
    pub fn compress(&mut self, budget: usize) -> Result<()> {
        if !self.is_leaf || self.compressed {
            return Err(Error::NotCompressed);
        }
        // The synthetic entry keeps the first real key so that parents route
        // to this node without decompressing it.
        let key = match self.inodes.first() {
            Some(first) => first.key.clone(),
            None => return Err(Error::NotCompressed),
        };
        let blob = compress::compress_block(&compress::encode_inodes(&self.inodes));
        let size = PAGE_HEADER_SIZE + LEAF_PAGE_ELEMENT_SIZE + key.len() + blob.len();
        if size >= budget {
            trace!("leaf {} not compressed: {} bytes against budget {}",
                   self.pgid,
                   size,
                   budget);
            return Err(Error::NotCompressed);
        }

        trace!("leaf {} compressed: {} -> {} bytes", self.pgid, self.size(), size);
        self.inodes = vec![Inode {
                               flags: InodeFlags::COMPRESSED_PAYLOAD.bits(),
                               pgid: 0,
                               key: key,
                               value: blob,
                           }];
        self.compressed = true;
        Ok(())
    }

    /// Restores the entries of a compressed leaf.
    pub fn decompress(&mut self) -> Result<()> {
        if !self.compressed {
            return Err(Error::NotCompressed);
        }
        let inodes = match self.inodes.first() {
            Some(synthetic) => {
                let raw = compress::decompress_block(&synthetic.value)?;
                let inodes = compress::decode_inodes(&raw)?;
                if inodes.first().map(|first| &first.key) != Some(&synthetic.key) {
                    return Err(Error::corrupt(format!("compressed leaf {} does not start at its \
                                                       routing key",
                                                      self.pgid)));
                }
                inodes
            }
            None => return Err(Error::corrupt("compressed leaf has no payload")),
        };
        self.inodes = inodes;
        self.compressed = false;
        Ok(())
    }
}

// Range of an element's key or value, checked against the page.
fn element_range(buf: &[u8], start: usize, len: u32, id: PageId) -> Result<::std::ops::Range<usize>> {
    page::checked_range(start, len as usize, buf.len()).ok_or_else(|| {
        Error::corrupt(format!("page {}: element data {}+{} lies outside {} bytes",
                               id,
                               start,
                               len,
                               buf.len()))
    })
}

/// Clamped split threshold for a page size and fill percentage.
pub fn split_threshold(page_size: usize, fill_percent: f64) -> usize {
    let fill = fill_percent.max(MIN_FILL_PERCENTAGE).min(MAX_FILL_PERCENTAGE);
    ((page_size as f64 * fill) as usize).max(MIN_SPLIT_PAGE_SIZE)
}
