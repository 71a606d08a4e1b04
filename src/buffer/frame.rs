//! Frame - a cached page plus the metadata the buffer pool needs.
//!
//! A [`Frame`] holds one [`HeapPage`] and a pin count. The page's own dirty
//! mark decides NO-STEAL eligibility; the pin count keeps a page resident
//! while a guard references it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{
    ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};

use crate::common::PageId;
use crate::storage::page::HeapPage;

/// A cached page in the buffer pool.
///
/// # Thread Safety
/// - `page`: `Arc<RwLock>` so guards can own their latch independently of
///   the cache map
/// - `pin_count`: `AtomicU32` for lock-free reference counting
pub struct Frame {
    page_id: PageId,
    page: Arc<RwLock<HeapPage>>,
    pin_count: AtomicU32,
}

impl Frame {
    /// Wrap a freshly loaded page. The frame starts unpinned.
    pub fn new(page: HeapPage) -> Self {
        Self {
            page_id: page.page_id(),
            page: Arc::new(RwLock::new(page)),
            pin_count: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    // ========================================================================
    // Page access (RwLock)
    // ========================================================================

    /// Acquire read latch on the page.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, HeapPage> {
        self.page.read()
    }

    /// Acquire write latch on the page.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, HeapPage> {
        self.page.write()
    }

    /// Owned read latch, for guards that outlive the borrow of the frame.
    #[inline]
    pub(crate) fn page_arc(&self) -> ArcRwLockReadGuard<RawRwLock, HeapPage> {
        self.page.read_arc()
    }

    /// Owned write latch.
    #[inline]
    pub(crate) fn page_mut_arc(&self) -> ArcRwLockWriteGuard<RawRwLock, HeapPage> {
        self.page.write_arc()
    }

    // ========================================================================
    // Pin count operations (Atomic)
    // ========================================================================

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if pin count is already 0.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        assert!(old > 0, "pin count underflow");
        old - 1
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    /// Whether NO-STEAL eviction may drop this frame: unpinned and clean.
    ///
    /// Never blocks. A frame whose latch is momentarily held is treated as
    /// not evictable.
    pub fn is_evictable(&self) -> bool {
        if self.is_pinned() {
            return false;
        }
        match self.page.try_read() {
            Some(page) => !page.is_dirty(),
            None => false,
        }
    }
}
