//! Restartable scan over the tuples of one heap file.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, Result, TransactionId};
use crate::storage::heap_file::HeapFile;
use crate::storage::tuple::Tuple;

/// Lazy, forward-only scan of a table in page-then-slot order.
///
/// Each page is fetched read-only through the buffer pool, so scanning takes
/// a shared lock on every page it visits. The tuples of the current page are
/// copied out and the page guard dropped right away; the iterator never
/// holds a page latch between calls.
///
/// The page count is sampled by [`open`](Self::open) and
/// [`rewind`](Self::rewind); pages appended afterwards are not visited.
///
/// # Example
/// ```ignore
/// let mut it = bpm.scan(tid, table_id)?;
/// it.open()?;
/// while it.has_next()? {
///     let tuple = it.next_tuple()?.unwrap();
///     // ...
/// }
/// it.close();
/// ```
pub struct HeapFileIterator<'a> {
    pool: &'a BufferPoolManager,
    file: Arc<HeapFile>,
    tid: TransactionId,
    is_open: bool,
    next_page: u32,
    num_pages: u32,
    /// Tuples of the current page not yet returned.
    pending: VecDeque<Tuple>,
}

impl<'a> HeapFileIterator<'a> {
    /// Create a closed iterator.
    pub fn new(pool: &'a BufferPoolManager, file: Arc<HeapFile>, tid: TransactionId) -> Self {
        Self {
            pool,
            file,
            tid,
            is_open: false,
            next_page: 0,
            num_pages: 0,
            pending: VecDeque::new(),
        }
    }

    /// Start the scan at page zero.
    pub fn open(&mut self) -> Result<()> {
        self.num_pages = self.file.num_pages()?;
        self.next_page = 0;
        self.pending.clear();
        self.is_open = true;
        Ok(())
    }

    /// Whether another tuple remains. Always false on a closed iterator.
    ///
    /// May fetch (and lock) the following pages to find out.
    pub fn has_next(&mut self) -> Result<bool> {
        if !self.is_open {
            return Ok(false);
        }
        while self.pending.is_empty() {
            if self.next_page >= self.num_pages {
                return Ok(false);
            }
            let page_id = PageId::new(self.file.table_id(), self.next_page);
            let page = self.pool.fetch_page_read(self.tid, page_id)?;
            self.pending.extend(page.tuples().cloned());
            self.next_page += 1;
        }
        Ok(true)
    }

    /// The next tuple, or `None` once the scan is exhausted or closed.
    pub fn next_tuple(&mut self) -> Result<Option<Tuple>> {
        if self.has_next()? {
            Ok(self.pending.pop_front())
        } else {
            Ok(None)
        }
    }

    /// Restart from page zero, re-fetching every page.
    pub fn rewind(&mut self) -> Result<()> {
        self.close();
        self.open()
    }

    /// Stop the scan. Locks already taken stay with the transaction.
    pub fn close(&mut self) {
        self.is_open = false;
        self.pending.clear();
    }
}

impl Iterator for HeapFileIterator<'_> {
    type Item = Result<Tuple>;

    /// Opens the scan on first use.
    fn next(&mut self) -> Option<Self::Item> {
        if !self.is_open {
            if let Err(e) = self.open() {
                return Some(Err(e));
            }
        }
        self.next_tuple().transpose()
    }
}
