// Operating system page size. Ideally this should be populated
// dyanimically.
pub const OS_PAGE_SIZE: usize = 4096;

// Size of the fixed page header: pgid(8) | flags(2) | count(2) | overflow(4).
pub const PAGE_HEADER_SIZE: usize = 16;

// Leaf and branch element headers are both 16 bytes so sizing never has to
// look at the node kind.
pub const LEAF_PAGE_ELEMENT_SIZE: usize = 16;
pub const BRANCH_PAGE_ELEMENT_SIZE: usize = 16;

// The minimum number of keys required in a database page.
// Setting this to a larger value will place a smaller bound on the
// maximum size of a data item. Data items larger than this size will
// be pushed into overflow pages instead of being stored directly in
// the B-tree node. The value cannot be lower than 2 because then there
// would no longer be a tree structure.
pub const MIN_KEYS_PER_PAGE: usize = 2;

// Smallest split threshold. A node is never cut into pieces smaller than
// a header plus the minimum number of element headers.
pub const MIN_SPLIT_PAGE_SIZE: usize = PAGE_HEADER_SIZE + MIN_KEYS_PER_PAGE * LEAF_PAGE_ELEMENT_SIZE;

// A stamp that identifies a file as a jumpdb file.
// There's nothing special about this value other than that it is easily
// recognizable, and it will reflect any byte order mismatches.
pub const MAGIC_KEY: u32 = 0xBADC0DE;

// The data file format version.
pub const VERSION: u32 = 2;

// MaxKeySize is the maximum length of a key, in bytes.
pub const MAX_KEY_SIZE: usize = 32768;

// MaxValueSize is the maximum length of a value, in bytes
pub const MAX_VALUE_SIZE: usize = (1 << 31) - 2;

pub const MIN_FILL_PERCENTAGE: f64 = 0.1;
pub const MAX_FILL_PERCENTAGE: f64 = 1.0;

// DefaultFillPercent is the percentage that split pages are filled.
// This value can be changed per arena through Settings.
pub const DEF_FILL_PERCENTAGE: f64 = 0.5;
