//! FIFO (First-In-First-Out) victim selection.
//!
//! The buffer pool decides *whether* a page may go (clean and unpinned);
//! the replacer only decides *which* of the eligible pages goes first.

use std::collections::{HashSet, VecDeque};

use crate::common::PageId;

/// Evicts pages in the order they entered the cache.
///
/// Pages the caller rejects keep their place in the queue.
pub struct FifoReplacer {
    /// Page IDs in load order (front = oldest).
    queue: VecDeque<PageId>,

    /// Set for O(1) membership check.
    in_queue: HashSet<PageId>,
}

impl FifoReplacer {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            in_queue: HashSet::new(),
        }
    }

    /// Record that a page was loaded into the cache.
    ///
    /// Re-recording a page already tracked does not move it.
    pub fn record_load(&mut self, page_id: PageId) {
        if self.in_queue.insert(page_id) {
            self.queue.push_back(page_id);
        }
    }

    /// Pick and forget the oldest page for which `evictable` holds.
    ///
    /// Returns None if no tracked page qualifies.
    pub fn evict<F>(&mut self, mut evictable: F) -> Option<PageId>
    where
        F: FnMut(&PageId) -> bool,
    {
        let pos = self
            .queue
            .iter()
            .position(|pid| self.in_queue.contains(pid) && evictable(pid))?;
        let victim = self.queue.remove(pos)?;
        self.in_queue.remove(&victim);
        Some(victim)
    }

    /// Stop tracking a page (discarded from the cache).
    pub fn remove(&mut self, page_id: PageId) {
        if self.in_queue.remove(&page_id) {
            self.queue.retain(|pid| *pid != page_id);
        }
    }

    /// Number of tracked pages.
    pub fn size(&self) -> usize {
        self.in_queue.len()
    }
}

impl Default for FifoReplacer {
    fn default() -> Self {
        Self::new()
    }
}
