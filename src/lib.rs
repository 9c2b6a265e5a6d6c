//! Stratum - the storage core of a disk-oriented database, in Rust
//!
//! Pages live on disk and are cached in a fixed set of in-memory frames.
//! On top of that cache sits a concurrent B+Tree index.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): page-granular disk I/O
//!   - `DiskManager`: reads and writes pages by id (`FileDiskManager`, `MemoryDiskManager`)
//!   - `DiskScheduler`: background worker that serializes disk requests
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: fetches pages from disk and caches them in frames
//!   - `LruKReplacer`: LRU-K eviction policy
//!   - `FrameHeader`: per-frame metadata and data
//!   - `BasicPageGuard`/`ReadPageGuard`/`WritePageGuard`: RAII pins and latches
//!
//! - **Index** (`index`): B+Tree with unique keys
//!   - `BPlusTree`: point lookup, insert, delete and ordered scans
//!   - `IndexIterator`: forward scan along the leaf chain
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stratum::buffer::BufferPoolManager;
//! use stratum::common::RecordId;
//! use stratum::index::{BPlusTree, FromInteger, OrdComparator};
//! use stratum::storage::disk::FileDiskManager;
//!
//! let disk_manager = Arc::new(FileDiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, 2, disk_manager));
//!
//! // The tree keeps its root pointer in a header page owned by the caller
//! let header_page_id = bpm.new_page_guarded().unwrap().page_id();
//! let tree: BPlusTree<i64, RecordId, _> =
//!     BPlusTree::new("orders_pk", header_page_id, bpm.clone(), OrdComparator, 32, 32).unwrap();
//!
//! tree.insert(&42, &RecordId::from_integer(42)).unwrap();
//! assert_eq!(tree.get_value(&42).unwrap(), Some(RecordId::from_integer(42)));
//!
//! for entry in tree.begin().unwrap() {
//!     let (key, rid) = entry.unwrap();
//!     println!("{} -> {}", key, rid);
//! }
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{PageId, RecordId, Result, SlotId, StratumError};
