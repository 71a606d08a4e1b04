//! The page cache shared by all transactions.
//!
//! Every page a transaction touches is obtained through the
//! [`BufferPoolManager`], which takes the page lock for the transaction,
//! keeps at most `pool_pages` pages in memory, and enforces NO-STEAL:
//! a page dirtied by an uncommitted transaction is never evicted.
//!
//! # Components
//! - [`BufferPoolManager`] - Cache, table registry, commit/abort
//! - [`Frame`] - A cached page plus its pin count
//! - [`PageGuard`] / [`PageReadGuard`] / [`PageWriteGuard`] - RAII page access
//! - [`BufferPoolStats`] - Counters
//! - [`replacer`] - Victim selection

mod buffer_pool_manager;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame::Frame;
pub use page_guard::{PageGuard, PageReadGuard, PageWriteGuard};
pub use stats::{BufferPoolStats, StatsSnapshot};
