//! RAII guards for page access.
//!
//! These guards provide scoped access to pages in the buffer pool:
//! - [`PageReadGuard`] - Shared read access
//! - [`PageWriteGuard`] - Exclusive write access
//! - [`PageGuard`] - Either of the two, as returned by `get_page`
//!
//! A guard pins its frame, so the page can't be evicted while the guard is
//! alive, and unpins it when dropped. Guards hold the page latch, not the
//! transaction lock: the transaction lock stays until commit or abort.
//! Drop every guard before completing the transaction.
//!
//! Latches are not reentrant. A thread still holding a [`PageReadGuard`]
//! that fetches the same page for writing (directly, or through
//! `insert_tuple` / `delete_tuple`) waits on its own read latch forever,
//! even though the lock upgrade itself is granted. Drop read guards on a
//! page before upgrading it.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock};

use crate::common::PageId;
use crate::storage::page::HeapPage;

use super::frame::Frame;

/// Guard for read-only page access.
///
/// # Example
/// ```ignore
/// let guard = bpm.fetch_page_read(tid, page_id)?;
/// let n = guard.tuples().count();  // Deref to &HeapPage
/// // guard drops here, page unpinned
/// ```
pub struct PageReadGuard {
    frame: Arc<Frame>,
    lock: ArcRwLockReadGuard<RawRwLock, HeapPage>,
}

impl PageReadGuard {
    /// Latch a frame the caller has already pinned.
    pub(crate) fn new(frame: Arc<Frame>) -> Self {
        let lock = frame.page_arc();
        Self { frame, lock }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.frame.page_id()
    }
}

impl Deref for PageReadGuard {
    type Target = HeapPage;

    #[inline]
    fn deref(&self) -> &HeapPage {
        &self.lock
    }
}

impl Drop for PageReadGuard {
    fn drop(&mut self) {
        self.frame.unpin();
    }
}

/// Guard for exclusive page access.
///
/// Mutating through this guard does not mark the page dirty by itself;
/// callers record the owning transaction with
/// [`HeapPage::mark_dirty`].
pub struct PageWriteGuard {
    frame: Arc<Frame>,
    lock: ArcRwLockWriteGuard<RawRwLock, HeapPage>,
}

impl PageWriteGuard {
    /// Latch a frame the caller has already pinned.
    pub(crate) fn new(frame: Arc<Frame>) -> Self {
        let lock = frame.page_mut_arc();
        Self { frame, lock }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.frame.page_id()
    }
}

impl Deref for PageWriteGuard {
    type Target = HeapPage;

    #[inline]
    fn deref(&self) -> &HeapPage {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard {
    #[inline]
    fn deref_mut(&mut self) -> &mut HeapPage {
        &mut self.lock
    }
}

impl Drop for PageWriteGuard {
    fn drop(&mut self) {
        self.frame.unpin();
    }
}

/// A page fetched under some [`Permissions`](crate::common::Permissions).
pub enum PageGuard {
    Read(PageReadGuard),
    Write(PageWriteGuard),
}

impl PageGuard {
    #[inline]
    pub fn page_id(&self) -> PageId {
        match self {
            PageGuard::Read(g) => g.page_id(),
            PageGuard::Write(g) => g.page_id(),
        }
    }

    /// Mutable access, if the page was fetched read-write.
    pub fn as_mut(&mut self) -> Option<&mut HeapPage> {
        match self {
            PageGuard::Read(_) => None,
            PageGuard::Write(g) => Some(&mut **g),
        }
    }
}

impl Deref for PageGuard {
    type Target = HeapPage;

    fn deref(&self) -> &HeapPage {
        match self {
            PageGuard::Read(g) => &**g,
            PageGuard::Write(g) => &**g,
        }
    }
}
