/*!
Node layer of a single-file, copy-on-write B+tree key/value store.

Committed pages are materialized into mutable `Node`s on demand. Writes go
to those nodes, and at commit time `NodeArena::spill` rebalances, splits,
optionally compresses and serializes every dirty node into freshly
allocated pages handed out by a `Pager`.

```no_run
use jumpdb::{MmapPager, Node, NodeArena, Settings};

let settings = Settings::default().with_compression(true);
let mut pager = MmapPager::open("data.jump", settings.clone()).unwrap();
let mut arena = NodeArena::new(settings);

let mut leaf = Node::new(true);
leaf.put(b"john", b"john", b"johnson", 0, 0);
let leaf = arena.insert(leaf);
arena.spill(&mut pager, leaf).unwrap();
pager.commit().unwrap();
```
*/
#![warn(missing_debug_implementations,
        unused_extern_crates,
        unused_import_braces,
        unused_allocation)]

#[macro_use]
extern crate bitflags;

#[macro_use]
extern crate log;

pub mod arena;
pub mod compress;
pub mod constants;
mod enc;
pub mod errors;
pub mod inode;
pub mod node;
pub mod page;
pub mod pager;
pub mod settings;

pub use crate::arena::{NodeArena, NodeId};
pub use crate::errors::{Error, Result};
pub use crate::inode::{Inode, InodeFlags};
pub use crate::node::Node;
pub use crate::page::{PageFlags, PageId};
pub use crate::pager::{MemPager, MmapPager, PageBuf, Pager};
pub use crate::settings::Settings;
