use super::types::{FrameId, PageId};

/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Invalid page ID constant
pub const INVALID_PAGE_ID: PageId = PageId(u32::MAX);

/// Invalid frame ID constant
pub const INVALID_FRAME_ID: FrameId = FrameId(u32::MAX);

/// Default K value for LRU-K replacement policy
pub const DEFAULT_LRUK_K: usize = 2;

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 64;

/// Depth of the disk scheduler's request queue
pub const DISK_SCHEDULER_QUEUE_DEPTH: usize = 128;

/// Smallest leaf max size that still lets a full leaf split in two
pub const MIN_LEAF_MAX_SIZE: usize = 2;

/// Smallest internal max size; below this a split would leave a page with one child
pub const MIN_INTERNAL_MAX_SIZE: usize = 3;
