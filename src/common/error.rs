//! Error types for heapstore.

use thiserror::Error;

use super::{PageId, TableId, TransactionId};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in heapstore.
///
/// Every failure in the storage core surfaces through this enum. Nothing is
/// logged and dropped inside the core: the caller always sees the error and
/// decides whether to retry or abort.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page lies beyond the current extent of its file.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// No table is registered under this id.
    #[error("{0} not found")]
    TableNotFound(TableId),

    /// The requesting transaction is part of a wait-for cycle.
    ///
    /// The caller must abort `tid` (discard its pages, release its locks)
    /// and may retry the work as a new transaction.
    #[error("deadlock detected: {tid} waiting for lock on {page_id}")]
    Deadlock { tid: TransactionId, page_id: PageId },

    /// The configured lock timeout elapsed before the lock was granted.
    #[error("lock wait timed out: {tid} waiting for lock on {page_id}")]
    LockTimeout { tid: TransactionId, page_id: PageId },

    /// The buffer pool is full and every cached page is dirty or pinned.
    #[error("buffer pool exhausted: all {capacity} pages are dirty or pinned")]
    CapacityExhausted { capacity: usize },

    /// The page has no free slot left.
    #[error("{0} has no free slot")]
    PageFull(PageId),

    /// The tuple is not stored where its record id says it is.
    #[error("tuple not found: {0}")]
    TupleNotFound(String),

    /// A tuple does not conform to the table's descriptor.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A tuple is too wide to fit even one slot in a page.
    #[error("tuple width {width} does not fit in a {page_size}-byte page")]
    TupleTooWide { width: usize, page_size: usize },

    /// Page bytes failed to decode.
    #[error("corrupt {page_id}: {reason}")]
    CorruptPage { page_id: PageId, reason: String },
}

impl Error {
    /// Whether this error requires the owning transaction to abort.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Deadlock { .. } | Error::LockTimeout { .. })
    }
}
