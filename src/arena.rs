//! Transaction-scoped ownership of nodes.
//!
//! Nodes point at their parent and at their materialized children. Those
//! links are `NodeId`s into the arena, and the whole arena is dropped when
//! the transaction ends, so the cycles never need to be broken by hand.

use std::cmp;
use std::collections::HashMap;
use std::mem;
use std::ops::{Index, IndexMut};

use crate::errors::{Error, Result};
use crate::inode;
use crate::node::{split_threshold, Node};
use crate::page::{pages_for, PageId};
use crate::pager::Pager;
use crate::settings::Settings;

/// Handle to a node owned by a `NodeArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// All nodes materialized or created by one transaction.
#[derive(Debug)]
pub struct NodeArena {
    settings: Settings,
    nodes: Vec<Node>,
    // Materialized nodes by the page they were read from.
    by_pgid: HashMap<PageId, NodeId>,
    // Pages released during this transaction. The freelist picks these up
    // once no reader can still see them.
    freed: Vec<PageId>,
}

impl Index<NodeId> for NodeArena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for NodeArena {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

impl NodeArena {
    pub fn new(settings: Settings) -> NodeArena {
        NodeArena {
            settings: settings,
            nodes: Vec::new(),
            by_pgid: HashMap::new(),
            freed: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Takes ownership of a node, typically a fresh bucket root.
    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        if node.pgid != 0 {
            self.by_pgid.insert(node.pgid, id);
        }
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pages released so far by spill, merges and root collapses.
    pub fn freed(&self) -> &[PageId] {
        &self.freed
    }

    /// Top-most ancestor of `id`.
    pub fn root(&self, id: NodeId) -> NodeId {
        let mut id = id;
        while let Some(parent) = self[id].parent {
            id = parent;
        }
        id
    }

    /// Materializes the node for page `pgid`, reusing it if this transaction
    /// already did. Compressed leaves are decompressed so they can be mutated.
    pub fn node<P: Pager>(&mut self, pager: &P, pgid: PageId, parent: Option<NodeId>) -> Result<NodeId> {
        if let Some(&id) = self.by_pgid.get(&pgid) {
            return Ok(id);
        }

        let mut node = Node::read(pager.page(pgid)?)?;
        if node.compressed {
            node.decompress()?;
        }
        node.parent = parent;
        let id = self.insert(node);
        if let Some(parent) = parent {
            self[parent].children.push(id);
        }
        Ok(id)
    }

    /// Child of branch `id` at inode `index`.
    pub fn child_at<P: Pager>(&mut self, pager: &P, id: NodeId, index: usize) -> Result<NodeId> {
        if self[id].is_leaf {
            return Err(Error::corrupt(format!("invalid child_at({}) on a leaf node", index)));
        }
        let pgid = match self[id].inodes.get(index) {
            Some(inode) => inode.pgid,
            None => {
                return Err(Error::corrupt(format!("child_at({}) on a branch with {} children",
                                                  index,
                                                  self[id].inodes.len())))
            }
        };
        self.node(pager, pgid, Some(id))
    }

    /// Position of `id` among its parent's entries.
    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        self[id].parent.map(|parent| inode::search(&self[parent].inodes, &self[id].key))
    }

    pub fn num_children(&self, id: NodeId) -> usize {
        self[id].inodes.len()
    }

    pub fn next_sibling<P: Pager>(&mut self, pager: &P, id: NodeId) -> Result<Option<NodeId>> {
        let (parent, index) = match (self[id].parent, self.child_index(id)) {
            (Some(parent), Some(index)) => (parent, index),
            _ => return Ok(None),
        };
        if index + 1 >= self.num_children(parent) {
            return Ok(None);
        }
        self.child_at(pager, parent, index + 1).map(Some)
    }

    pub fn prev_sibling<P: Pager>(&mut self, pager: &P, id: NodeId) -> Result<Option<NodeId>> {
        let (parent, index) = match (self[id].parent, self.child_index(id)) {
            (Some(parent), Some(index)) => (parent, index),
            _ => return Ok(None),
        };
        if index == 0 {
            return Ok(None);
        }
        self.child_at(pager, parent, index - 1).map(Some)
    }

    /// Forgets `target` as a materialized child of `id`.
    pub fn remove_child(&mut self, id: NodeId, target: NodeId) {
        self[id].children.retain(|&child| child != target);
    }

    /// Releases the node's page and detaches it from its page id.
    pub fn free(&mut self, id: NodeId) {
        let pgid = self[id].pgid;
        if pgid != 0 {
            self.freed.push(pgid);
            self.by_pgid.remove(&pgid);
            self[id].pgid = 0;
        }
    }

    /// Breaks `id` into siblings that each fit the fill threshold of
    /// `page_size`, linking them under a shared parent.
    ///
    /// Returns the node itself followed by any new siblings, left to right.
    /// The parent gets routing entries for the siblings at spill, once they
    /// have page ids.
    pub fn split(&mut self, id: NodeId, page_size: usize) -> Vec<NodeId> {
        let threshold = split_threshold(page_size, self.settings.fill_percent);
        let mut nodes = vec![id];
        let mut current = id;
        // Only the original node is measured against the whole page; every
        // piece after the first cut has to meet the fill threshold.
        let mut limit = page_size;
        while let Some(mut next) = self[current].split_two(limit, threshold) {
            let parent = match self[current].parent {
                Some(parent) => parent,
                None => {
                    let mut parent = Node::new(false);
                    parent.children.push(current);
                    let parent = self.insert(parent);
                    self[current].parent = Some(parent);
                    parent
                }
            };
            next.parent = Some(parent);
            let next = self.insert(next);
            self[parent].children.push(next);
            trace!("split node at {} entries, right sibling has {}",
                   self[current].inodes.len(),
                   self[next].inodes.len());
            nodes.push(next);
            current = next;
            limit = threshold;
        }
        nodes
    }

    /// Writes `id` and its dirty descendants to freshly allocated pages,
    /// splitting and compressing as configured.
    pub fn spill<P: Pager>(&mut self, pager: &mut P, id: NodeId) -> Result<()> {
        if self[id].spilled {
            return Ok(());
        }

        // Spill child nodes first. Spilling a child can add split siblings to
        // this node's children, so the length is re-read on every iteration.
        let mut children = mem::replace(&mut self[id].children, Vec::new());
        children.sort_by(|a, b| self.first_key(*a).cmp(self.first_key(*b)));
        self[id].children = children;
        let mut i = 0;
        while i < self[id].children.len() {
            let child = self[id].children[i];
            self.spill(pager, child)?;
            i += 1;
        }
        // The child list is only used for spill tracking.
        self[id].children.clear();

        let page_size = pager.page_size();
        self.try_compress(id, page_size)?;
        let nodes = self.split(id, page_size);
        for &nid in &nodes {
            if nodes.len() > 1 {
                self.try_compress(nid, page_size)?;
            }

            // Release the page the node was read from.
            self.free(nid);

            let size = self[nid].size();
            let mut buf = pager.allocate(pages_for(size, page_size))?;
            self[nid].pgid = buf.id();
            self[nid].write(buf.data_mut())?;
            pager.write_page(buf)?;
            self[nid].spilled = true;

            // Insert into parent inodes.
            if let Some(parent) = self[nid].parent {
                let first = match self[nid].inodes.first() {
                    Some(first) => first.key.clone(),
                    None => return Err(Error::corrupt("cannot spill an empty child node")),
                };
                let key = if self[nid].key.is_empty() {
                    first.clone()
                } else {
                    self[nid].key.clone()
                };
                let pgid = self[nid].pgid;
                self[parent].put(&key, &first, &[], pgid, 0);
                self[nid].key = first;
            }
            trace!("spilled node to page {} ({} bytes)", self[nid].pgid, size);
        }

        // If the root node split and created a new root then we need to spill
        // that as well.
        if let Some(parent) = self[id].parent {
            if self[parent].pgid == 0 {
                self[id].children.clear();
                return self.spill(pager, parent);
            }
        }
        Ok(())
    }

    // Offers a leaf to the compressor when compression is enabled. The budget
    // is the current size capped at one page, so a compressed node always
    // beats both its raw form and the page.
    fn try_compress(&mut self, id: NodeId, page_size: usize) -> Result<()> {
        if !self.settings.compress || !self[id].is_leaf || self[id].compressed {
            return Ok(());
        }
        let budget = cmp::min(self[id].size(), page_size);
        match self[id].compress(budget) {
            Ok(()) => {
                debug!("compressed leaf below {} bytes", budget);
                Ok(())
            }
            Err(Error::NotCompressed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Merges `id` into a sibling when deletes left it underfilled, cascading
    /// to the parent.
    pub fn rebalance<P: Pager>(&mut self, pager: &P, id: NodeId) -> Result<()> {
        if !self[id].unbalanced {
            return Ok(());
        }
        self[id].unbalanced = false;

        // Ignore if node is above threshold (25%) and has enough keys.
        let threshold = pager.page_size() / 4;
        if self[id].size() > threshold && self[id].inodes.len() > self[id].min_keys() {
            return Ok(());
        }

        // Root node has special handling.
        let parent = match self[id].parent {
            Some(parent) => parent,
            None => {
                // If root node is a branch and only has one node then collapse it.
                if !self[id].is_leaf && self[id].inodes.len() == 1 {
                    let child = self.child_at(pager, id, 0)?;
                    let is_leaf = self[child].is_leaf;
                    let inodes = mem::replace(&mut self[child].inodes, Vec::new());
                    let children = mem::replace(&mut self[child].children, Vec::new());

                    // Move root's child up and reparent the grandchildren.
                    for &grandchild in &children {
                        self[grandchild].parent = Some(id);
                    }
                    self[id].is_leaf = is_leaf;
                    self[id].inodes = inodes;
                    self[id].children = children;

                    // Remove old child.
                    self[child].parent = None;
                    self.free(child);
                    debug!("collapsed single-child root");
                }
                return Ok(());
            }
        };

        // If node has no keys then just remove it.
        if self[id].inodes.is_empty() {
            let key = self[id].key.clone();
            self[parent].del(&key);
            self.remove_child(parent, id);
            self.free(id);
            return self.rebalance(pager, parent);
        }

        if self.num_children(parent) < 2 {
            return Err(Error::corrupt("parent must have at least 2 children"));
        }

        // Destination node is right sibling if idx == 0, otherwise left sibling.
        let use_next_sibling = self.child_index(id) == Some(0);
        let target = if use_next_sibling {
            self.next_sibling(pager, id)?
        } else {
            self.prev_sibling(pager, id)?
        };
        let target = target.ok_or_else(|| Error::corrupt("underfilled node has no sibling"))?;

        // Move everything from `from` onto the end of `into`.
        let (into, from) = if use_next_sibling {
            (id, target)
        } else {
            (target, id)
        };
        let moved_children: Vec<NodeId> = self[from]
            .inodes
            .iter()
            .filter_map(|inode| self.by_pgid.get(&inode.pgid).cloned())
            .collect();
        for child in moved_children {
            if let Some(old_parent) = self[child].parent {
                self.remove_child(old_parent, child);
            }
            self[child].parent = Some(into);
            self[into].children.push(child);
        }
        let inodes = mem::replace(&mut self[from].inodes, Vec::new());
        self[into].inodes.extend(inodes);

        let key = self[from].key.clone();
        self[parent].del(&key);
        self.remove_child(parent, from);
        self.free(from);
        trace!("merged underfilled node into its {} sibling",
               if use_next_sibling { "right" } else { "left" });

        // Either this node or the target node was deleted from the parent so rebalance it.
        self.rebalance(pager, parent)
    }

    fn first_key(&self, id: NodeId) -> &[u8] {
        match self[id].inodes.first() {
            Some(first) => first.key.as_slice(),
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::inode::Inode;
    use crate::pager::MemPager;
    use quickcheck_macros::quickcheck;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn numbered_leaf(count: usize, value: &[u8]) -> Node {
        let mut n = Node::new(true);
        for i in 1..count + 1 {
            let key = format!("{:08}", i);
            n.put(key.as_bytes(), key.as_bytes(), value, 0, 0);
        }
        n
    }

    // Walks the written tree under `pgid` and returns its leaf entries in order.
    fn read_tree<P: Pager>(pager: &P, pgid: PageId, compressed_pages: &mut usize) -> Vec<Inode> {
        let mut node = Node::read(pager.page(pgid).unwrap()).unwrap();
        if node.is_compressed() {
            *compressed_pages += 1;
            node.decompress().unwrap();
        }
        if node.is_leaf() {
            return node.inodes().to_vec();
        }
        let mut out = vec![];
        for inode in node.inodes() {
            let children = read_tree(pager, inode.pgid, compressed_pages);
            assert_eq!(children[0].key, inode.key, "routing key mismatch");
            out.extend(children);
        }
        out
    }

    // Ensure that a node can split into appropriate subgroups.
    #[test]
    fn split_between_two_and_three() {
        let mut arena = NodeArena::new(Settings::default());
        let n = arena.insert(numbered_leaf(5, b"0123456701234567"));

        // Split between 2 & 3.
        let nodes = arena.split(n, 100);
        assert_eq!(nodes.len(), 2);

        let parent = arena[n].parent().unwrap();
        assert!(!arena[parent].is_leaf());
        let children = arena[parent].children().to_vec();
        assert_eq!(children, nodes);
        assert_eq!(arena[children[0]].inodes().len(), 2);
        assert_eq!(arena[children[1]].inodes().len(), 3);
        assert_eq!(arena[children[1]].inodes()[0].key, b"00000003".to_vec());
        assert_eq!(arena[children[1]].parent(), Some(parent));
    }

    // Ensure that a page with the minimum number of inodes just returns a single node.
    #[test]
    fn split_min_keys() {
        let mut arena = NodeArena::new(Settings::default());
        let n = arena.insert(numbered_leaf(2, b"0123456701234567"));
        assert_eq!(arena.split(n, 20), vec![n]);
        assert!(arena[n].parent().is_none());
    }

    // Ensure that a node that has keys that all fit on a page just returns one leaf.
    #[test]
    fn split_single_page() {
        let mut arena = NodeArena::new(Settings::default());
        let n = arena.insert(numbered_leaf(5, b"0123456701234567"));
        assert_eq!(arena.split(n, 4096), vec![n]);
        assert!(arena[n].parent().is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn split_into_many_siblings() {
        let mut arena = NodeArena::new(Settings::default().with_fill_percent(1.0));
        // 32 bytes per entry, 15 fit a 512 byte page after the header.
        let n = arena.insert(numbered_leaf(50, b"01234567"));
        let nodes = arena.split(n, 512);
        let sizes: Vec<usize> = nodes.iter().map(|&id| arena[id].inodes().len()).collect();
        assert_eq!(sizes, vec![15, 15, 15, 5]);
        let parent = arena[n].parent().unwrap();
        assert!(nodes.iter().all(|&id| arena[id].parent() == Some(parent)));
    }

    #[quickcheck]
    fn split_siblings_fit_and_keep_order(entries: Vec<(Vec<u8>, Vec<u8>)>, page: u16, fill: u8) -> bool {
        let page_size = page as usize % 4096 + 64;
        let fill_percent = MIN_FILL_PERCENTAGE + (fill % 91) as f64 / 100.0;
        let mut arena = NodeArena::new(Settings::default().with_fill_percent(fill_percent));
        let mut n = Node::new(true);
        for (k, v) in entries {
            if !k.is_empty() {
                n.put(&k, &k, &v, 0, 0);
            }
        }
        let original = n.inodes().to_vec();
        let id = arena.insert(n);
        let nodes = arena.split(id, page_size);

        let joined: Vec<Inode> = nodes.iter().flat_map(|&id| arena[id].inodes().to_vec()).collect();
        let fits = nodes.len() == 1 ||
                   nodes.iter().all(|&id| {
            arena[id].size() as f64 <= page_size as f64 * fill_percent ||
            arena[id].inodes().len() <= 2 * MIN_KEYS_PER_PAGE
        });
        joined == original && fits
    }

    #[test]
    fn spill_writes_a_readable_tree() {
        init();
        let mut pager = MemPager::new(512);
        let mut arena = NodeArena::new(Settings::default().with_page_size(512));
        let leaf = arena.insert(numbered_leaf(300, b"01234567"));
        let original = arena[leaf].inodes().to_vec();

        let root = arena.root(leaf);
        arena.spill(&mut pager, root).unwrap();
        let root = arena.root(leaf);
        assert!(root != leaf);
        assert!(arena[root].is_spilled());
        assert!(arena[root].pgid() != 0);
        // a fresh tree frees nothing
        assert!(arena.freed().is_empty());

        let mut compressed = 0;
        assert_eq!(read_tree(&pager, arena[root].pgid(), &mut compressed), original);
        assert_eq!(compressed, 0);
    }

    #[test]
    fn spill_with_compression() {
        init();
        let value = b"johnson lake ".repeat(10);
        let mut pager = MemPager::new(4096);
        let mut arena = NodeArena::new(Settings::default().with_compression(true));
        let leaf = arena.insert(numbered_leaf(200, &value));
        let original = arena[leaf].inodes().to_vec();

        arena.spill(&mut pager, leaf).unwrap();
        let root = arena.root(leaf);

        let mut compressed = 0;
        assert_eq!(read_tree(&pager, arena[root].pgid(), &mut compressed), original);
        assert!(compressed > 0);
    }

    #[test]
    fn spill_large_value_uses_overflow_pages() {
        let mut pager = MemPager::new(512);
        let mut arena = NodeArena::new(Settings::default());
        let mut n = Node::new(true);
        n.put(b"big", b"big", &vec![7u8; 2000], 0, 0);
        let leaf = arena.insert(n);
        arena.spill(&mut pager, leaf).unwrap();

        let pgid = arena[leaf].pgid();
        let page = pager.page(pgid).unwrap();
        assert_eq!(page.len(), 4 * 512);
        let back = Node::read(page).unwrap();
        assert_eq!(back.inodes()[0].value, vec![7u8; 2000]);
    }

    // Writes a tree of `count` numbered keys and returns the root page.
    fn committed_tree(pager: &mut MemPager, settings: &Settings, count: usize) -> PageId {
        let mut arena = NodeArena::new(settings.clone());
        let leaf = arena.insert(numbered_leaf(count, b"01234567"));
        arena.spill(pager, leaf).unwrap();
        let root = arena.root(leaf);
        arena[root].pgid()
    }

    #[test]
    fn rewrite_updates_routing_and_frees_old_pages() {
        let settings = Settings::default().with_page_size(512);
        let mut pager = MemPager::new(512);
        let root_pgid = committed_tree(&mut pager, &settings, 100);

        let mut arena = NodeArena::new(settings);
        let root = arena.node(&pager, root_pgid, None).unwrap();
        let child = arena.child_at(&pager, root, 0).unwrap();
        let old_child_pgid = arena[child].pgid();
        // replace the first key so the parent has to rename its entry
        arena[child].del(b"00000001");
        arena[child].put(b"00000000", b"00000000", b"x", 0, 0);
        arena.spill(&mut pager, root).unwrap();

        assert_eq!(arena.freed(), &[old_child_pgid, root_pgid]);
        let mut compressed = 0;
        let entries = read_tree(&pager, arena[root].pgid(), &mut compressed);
        assert_eq!(entries.len(), 100);
        assert_eq!(entries[0].key, b"00000000".to_vec());
        assert_eq!(entries[1].key, b"00000002".to_vec());
    }

    #[test]
    fn node_is_materialized_once() {
        let settings = Settings::default().with_page_size(512);
        let mut pager = MemPager::new(512);
        let root_pgid = committed_tree(&mut pager, &settings, 100);

        let mut arena = NodeArena::new(settings);
        let root = arena.node(&pager, root_pgid, None).unwrap();
        let a = arena.child_at(&pager, root, 1).unwrap();
        let b = arena.child_at(&pager, root, 1).unwrap();
        assert_eq!(a, b);
        assert_eq!(arena[root].children(), &[a]);
        assert_eq!(arena.get(a).map(|n| n.parent()), Some(Some(root)));
        assert!(arena.get(NodeId(arena.len())).is_none());
        assert_eq!(arena.child_index(a), Some(1));
        assert!(arena.child_at(&pager, a, 0).is_err());
    }

    #[test]
    fn child_past_end_of_file_is_not_found() {
        let mut pager = MemPager::new(512);
        let far = (usize::max_value() / 512) as PageId;
        let mut branch = Node::new(false);
        branch.put(b"a", b"a", &[], far, 0);
        branch.put(b"m", b"m", &[], 99, 0);
        let mut buf = pager.allocate(1).unwrap();
        branch.write(buf.data_mut()).unwrap();
        let pgid = buf.id();
        pager.write_page(buf).unwrap();

        let mut arena = NodeArena::new(Settings::default().with_page_size(512));
        let root = arena.node(&pager, pgid, None).unwrap();
        assert!(matches!(arena.child_at(&pager, root, 0), Err(Error::PageNotFound(id)) if id == far));
        assert!(matches!(arena.child_at(&pager, root, 1), Err(Error::PageNotFound(99))));
        assert!(arena[root].children().is_empty());
    }

    #[test]
    fn rebalance_merges_with_next_sibling() {
        let settings = Settings::default().with_page_size(512);
        let mut pager = MemPager::new(512);
        let root_pgid = committed_tree(&mut pager, &settings, 100);

        let mut arena = NodeArena::new(settings);
        let root = arena.node(&pager, root_pgid, None).unwrap();
        let root_children = arena.num_children(root);
        let child = arena.child_at(&pager, root, 0).unwrap();
        // 7 entries of 32 bytes per leaf at 50% fill of 512
        assert_eq!(arena[child].inodes().len(), 7);
        for i in 2..8 {
            arena[child].del(format!("{:08}", i).as_bytes());
        }
        let sibling_pgid = arena[root].inodes()[1].pgid;

        arena.rebalance(&pager, child).unwrap();
        assert_eq!(arena[child].inodes().len(), 8);
        assert_eq!(arena.num_children(root), root_children - 1);
        assert_eq!(arena.freed(), &[sibling_pgid]);
        assert!(!arena[root].is_unbalanced());

        arena.spill(&mut pager, root).unwrap();
        let mut compressed = 0;
        let entries = read_tree(&pager, arena[root].pgid(), &mut compressed);
        assert_eq!(entries.len(), 94);
        assert!(inode::is_sorted(&entries));
    }

    #[test]
    fn rebalance_merges_last_child_into_previous() {
        let settings = Settings::default().with_page_size(512);
        let mut pager = MemPager::new(512);
        let root_pgid = committed_tree(&mut pager, &settings, 100);

        let mut arena = NodeArena::new(settings);
        let root = arena.node(&pager, root_pgid, None).unwrap();
        let last = arena.num_children(root) - 1;
        let child = arena.child_at(&pager, root, last).unwrap();
        let victim = arena[child].inodes()[0].key.clone();
        let remaining = arena[child].inodes().len() - 1;
        arena.get_mut(child).unwrap().del(&victim);

        let prev_pgid = arena[root].inodes()[last - 1].pgid;
        arena.rebalance(&pager, child).unwrap();
        assert_eq!(arena.num_children(root), last);
        let prev = arena.child_at(&pager, root, last - 1).unwrap();
        assert_eq!(arena[prev].pgid(), prev_pgid);
        assert_eq!(arena[prev].inodes().len(), 7 + remaining);
        assert_eq!(arena.freed().len(), 1);
    }

    #[test]
    fn rebalance_removes_empty_node_and_collapses_root() {
        let settings = Settings::default().with_page_size(512).with_fill_percent(1.0);
        let mut pager = MemPager::new(512);
        // 15 + 5 entries across two leaves
        let root_pgid = committed_tree(&mut pager, &settings, 20);

        let mut arena = NodeArena::new(settings);
        let root = arena.node(&pager, root_pgid, None).unwrap();
        assert_eq!(arena.num_children(root), 2);
        let left_pgid = arena[root].inodes()[0].pgid;
        let right = arena.child_at(&pager, root, 1).unwrap();
        let right_pgid = arena[right].pgid();
        for i in 16..21 {
            arena[right].del(format!("{:08}", i).as_bytes());
        }

        arena.rebalance(&pager, right).unwrap();
        assert!(arena[root].is_leaf());
        assert_eq!(arena[root].inodes().len(), 15);
        assert_eq!(arena.freed(), &[right_pgid, left_pgid]);

        arena.spill(&mut pager, root).unwrap();
        let mut compressed = 0;
        let entries = read_tree(&pager, arena[root].pgid(), &mut compressed);
        assert_eq!(entries.len(), 15);
    }

    #[test]
    fn materialized_compressed_leaf_is_decompressed() {
        let value = b"johnson lake ".repeat(10);
        let settings = Settings::default().with_compression(true);
        let mut pager = MemPager::new(4096);
        let mut arena = NodeArena::new(settings.clone());
        let leaf = arena.insert(numbered_leaf(10, &value));
        arena.spill(&mut pager, leaf).unwrap();
        let pgid = arena[leaf].pgid();
        assert!(Node::read(pager.page(pgid).unwrap()).unwrap().is_compressed());

        let mut arena = NodeArena::new(settings);
        let id = arena.node(&pager, pgid, None).unwrap();
        assert!(!arena[id].is_compressed());
        assert_eq!(arena[id].inodes().len(), 10);
        assert_eq!(arena[id].key(), b"00000001");
    }
}
