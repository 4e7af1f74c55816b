use std::time::Duration;

use super::types::PageId;

/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Invalid page ID constant (the all-ones encoding of -1)
pub const INVALID_PAGE_ID: PageId = PageId(u32::MAX);

/// Default K value for LRU-K replacement policy
pub const DEFAULT_LRUK_K: usize = 2;

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 64;

/// Default maximum number of entries in a B+ tree leaf page
pub const DEFAULT_LEAF_MAX_SIZE: u16 = 255;

/// Default maximum number of separator keys in a B+ tree internal page
pub const DEFAULT_INTERNAL_MAX_SIZE: u16 = 255;

/// Default interval between deadlock detection passes
pub const DEFAULT_DEADLOCK_DETECTION_INTERVAL: Duration = Duration::from_millis(50);
