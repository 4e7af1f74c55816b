//! Tarn - the storage and concurrency core of a disk-backed RDBMS
//!
//! This crate provides the layers that sit between the query executors of
//! a relational database and its disk: a buffer pool over a paged store, a
//! concurrent B+ tree index, and a hierarchical lock manager implementing
//! strict two-phase locking with deadlock detection.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): the persistent page store
//!   - `DiskManager`: fixed-size page reads and writes, with a file-backed
//!     implementation and an in-memory variant for tests
//!   - `DiskScheduler`: background worker that serializes disk I/O
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: caches pages in a fixed set of frames, tracks
//!     pin counts and dirty bits, evicts through the replacer
//!   - `LruKReplacer`: LRU-K page replacement policy
//!   - `BasicPageGuard`/`ReadPageGuard`/`WritePageGuard`: RAII handles
//!     that keep a page pinned and optionally hold its latch
//!
//! - **Index** (`index`): a persistent, concurrent B+ tree keyed by `u32`
//!   mapping to record ids, with latch-crabbing writes and a leaf-chain
//!   iterator
//!
//! - **Concurrency** (`concurrency`): transactions and locking
//!   - `LockManager`: table and row locks in five modes, FIFO wait queues
//!     with upgrade priority, wait-for-graph deadlock detection
//!   - `TransactionManager`: transaction lifecycle and lock release
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tarn::buffer::BufferPoolManager;
//! use tarn::index::BPlusTree;
//! use tarn::storage::disk::FileDiskManager;
//! use tarn::common::{
//!     PageId, RecordId, SlotId, DEFAULT_BUFFER_POOL_SIZE, DEFAULT_INTERNAL_MAX_SIZE,
//!     DEFAULT_LEAF_MAX_SIZE, DEFAULT_LRUK_K,
//! };
//!
//! let disk_manager = Arc::new(FileDiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(
//!     DEFAULT_BUFFER_POOL_SIZE,
//!     DEFAULT_LRUK_K,
//!     disk_manager,
//! ));
//!
//! let tree = BPlusTree::new(
//!     Arc::clone(&bpm),
//!     DEFAULT_LEAF_MAX_SIZE,
//!     DEFAULT_INTERNAL_MAX_SIZE,
//! ).unwrap();
//! tree.insert(42, RecordId::new(PageId::new(7), SlotId::new(0))).unwrap();
//! assert!(tree.get(42).unwrap().is_some());
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{PageId, RecordId, Result, SlotId, TarnError, TxnId};
