//! heapstore - A transactional page cache over heap files.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           heapstore                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Buffer Pool (buffer/)                       │   │
//! │  │   BufferPoolManager: cache, table registry,              │   │
//! │  │   NO-STEAL eviction, commit = flush, abort = discard     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │            ↓ acquire / release              ↓ read / write     │
//! │  ┌──────────────────────────┐   ┌──────────────────────────┐   │
//! │  │  Locking (concurrency/)  │   │  Storage (storage/)      │   │
//! │  │  LockManager: S / X page │   │  HeapFile + HeapPage     │   │
//! │  │  locks, wait-for graph   │   │  Tuple, TupleDesc        │   │
//! │  └──────────────────────────┘   └──────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transactions follow strict two-phase locking at page granularity:
//! every lock is held until [`BufferPoolManager::transaction_complete`].
//! A request that would close a cycle of waiting transactions fails with
//! [`Error::Deadlock`] and the caller is expected to abort.
//!
//! # Modules
//! - [`common`] - Shared primitives (ids, errors, config)
//! - [`buffer`] - The buffer pool
//! - [`concurrency`] - Page locks and deadlock detection
//! - [`storage`] - Heap files, slotted pages and tuples
//!
//! # Quick Start
//! ```no_run
//! use heapstore::{BufferPoolManager, Field, FieldType, StorageConfig, TransactionId, Tuple, TupleDesc};
//!
//! # fn main() -> heapstore::Result<()> {
//! let bpm = BufferPoolManager::new(StorageConfig::default());
//! let table = bpm.create_table("people.dat", TupleDesc::new(vec![FieldType::Int, FieldType::Str(16)]))?;
//!
//! let tid = TransactionId::new();
//! bpm.insert_tuple(tid, table, Tuple::new(vec![Field::Int(1), Field::from("ada")]))?;
//! bpm.transaction_complete(tid, true)?;
//!
//! let reader = TransactionId::new();
//! for tuple in bpm.scan(reader, table)? {
//!     println!("{}", tuple?);
//! }
//! bpm.transaction_complete(reader, true)?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{StorageConfig, DEFAULT_PAGE_SIZE, DEFAULT_POOL_PAGES};
pub use common::{Error, PageId, Permissions, Result, TableId, TransactionId};

pub use buffer::{BufferPoolManager, BufferPoolStats, PageGuard, StatsSnapshot};
pub use concurrency::{LockManager, LockMode};
pub use storage::page::HeapPage;
pub use storage::{Field, FieldType, HeapFile, HeapFileIterator, RecordId, Tuple, TupleDesc};
