//! Buffer Pool Manager - the page cache every transaction goes through.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between heap files and memory
//! - Page locking on behalf of transactions, via the [`LockManager`]
//! - NO-STEAL eviction: only clean, unpinned pages leave the cache
//! - The commit (flush) / abort (discard) protocol
//! - The table registry that issues [`TableId`]s

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::{debug, trace, warn};
use parking_lot::{Mutex, RwLock};

use crate::buffer::replacer::FifoReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageGuard, PageReadGuard, PageWriteGuard};
use crate::common::config::StorageConfig;
use crate::common::{Error, PageId, Permissions, Result, TableId, TransactionId};
use crate::concurrency::{LockManager, LockMode};
use crate::storage::{HeapFile, HeapFileIterator, Tuple, TupleDesc};

/// Cached frames plus the victim order, guarded together so a lookup never
/// sees a half-inserted or half-evicted page.
struct PageCache {
    frames: HashMap<PageId, Arc<Frame>>,
    replacer: FifoReplacer,
}

/// Caches pages of every registered table for all transactions.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                     BufferPoolManager                        │
/// │  ┌────────────────────────┐   ┌───────────────────────────┐  │
/// │  │ cache: Mutex<PageCache>│   │ lock_manager              │  │
/// │  │  PageId → Arc<Frame>   │   │  PageId → Lock (S / X)    │  │
/// │  │  FifoReplacer          │   │  Txn → {PageId}, wait-for │  │
/// │  └────────────────────────┘   └───────────────────────────┘  │
/// │  ┌────────────────────────┐   ┌───────────────────────────┐  │
/// │  │ tables: RwLock<...>    │   │ stats (atomic counters)   │  │
/// │  │  TableId → HeapFile    │   │                           │  │
/// │  └────────────────────────┘   └───────────────────────────┘  │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `cache`: `Mutex` — every lookup, load, eviction and discard runs
///   under it
/// - `tables`: `RwLock` — written only at registration
/// - `lock_manager`: its own mutex and condition variable
/// - `stats`: No lock — all atomic counters
///
/// The cache mutex is never held while waiting for a page lock. Lock order
/// is cache, then tables, then a heap file's handle.
///
/// # Usage
/// ```ignore
/// let bpm = BufferPoolManager::new(StorageConfig::default());
/// let table = bpm.create_table("t.dat", TupleDesc::new(vec![FieldType::Int]))?;
///
/// let tid = TransactionId::new();
/// bpm.insert_tuple(tid, table, Tuple::new(vec![1.into()]))?;
/// bpm.transaction_complete(tid, true)?;
/// ```
pub struct BufferPoolManager {
    config: StorageConfig,

    cache: Mutex<PageCache>,

    tables: RwLock<HashMap<TableId, Arc<HeapFile>>>,

    next_table_id: AtomicU32,

    lock_manager: LockManager,

    stats: BufferPoolStats,
}

impl BufferPoolManager {
    /// Create a buffer pool.
    ///
    /// # Panics
    /// Panics if `config.pool_pages` is 0.
    pub fn new(config: StorageConfig) -> Self {
        assert!(config.pool_pages > 0, "pool_pages must be > 0");

        Self {
            config,
            cache: Mutex::new(PageCache {
                frames: HashMap::with_capacity(config.pool_pages),
                replacer: FifoReplacer::new(),
            }),
            tables: RwLock::new(HashMap::new()),
            next_table_id: AtomicU32::new(0),
            lock_manager: LockManager::with_timeout(config.lock_timeout),
            stats: BufferPoolStats::new(),
        }
    }

    // ========================================================================
    // Public API: Tables
    // ========================================================================

    /// Create a new heap file at `path` and register it.
    pub fn create_table<P: AsRef<Path>>(&self, path: P, desc: TupleDesc) -> Result<TableId> {
        self.register_with(|table_id, page_size| {
            HeapFile::create(path, table_id, desc, page_size)
        })
    }

    /// Open an existing heap file at `path` and register it.
    pub fn open_table<P: AsRef<Path>>(&self, path: P, desc: TupleDesc) -> Result<TableId> {
        self.register_with(|table_id, page_size| {
            HeapFile::open(path, table_id, desc, page_size)
        })
    }

    fn register_with<F>(&self, build: F) -> Result<TableId>
    where
        F: FnOnce(TableId, usize) -> Result<HeapFile>,
    {
        let table_id = TableId::new(self.next_table_id.fetch_add(1, Ordering::Relaxed));
        let file = build(table_id, self.config.page_size)?;
        debug!("registered {} at {}", table_id, file.path().display());

        self.tables.write().insert(table_id, Arc::new(file));
        Ok(table_id)
    }

    /// Look up a registered table.
    pub fn table(&self, table_id: TableId) -> Result<Arc<HeapFile>> {
        self.tables
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(Error::TableNotFound(table_id))
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page on behalf of `tid`.
    ///
    /// `ReadOnly` takes a shared lock, `ReadWrite` an exclusive one. Blocks
    /// until the lock is granted. Serves the page from cache, or loads it
    /// from its heap file, evicting a clean page if the pool is full.
    ///
    /// # Errors
    /// - `Error::Deadlock` / `Error::LockTimeout`: abort `tid`
    /// - `Error::CapacityExhausted` if every cached page is dirty or pinned
    /// - `Error::PageNotFound`, `Error::TableNotFound`, I/O errors
    pub fn get_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> Result<PageGuard> {
        match perm {
            Permissions::ReadOnly => self.fetch_page_read(tid, page_id).map(PageGuard::Read),
            Permissions::ReadWrite => self.fetch_page_write(tid, page_id).map(PageGuard::Write),
        }
    }

    /// Fetch a page under a shared lock.
    pub fn fetch_page_read(&self, tid: TransactionId, page_id: PageId) -> Result<PageReadGuard> {
        self.lock_page(tid, page_id, LockMode::Shared)?;
        let frame = self.pin_page(page_id)?;
        Ok(PageReadGuard::new(frame))
    }

    /// Fetch a page under an exclusive lock.
    ///
    /// Upgrades a shared lock `tid` already holds. The calling thread must
    /// not hold a read guard on the same page: the latch isn't reentrant.
    pub fn fetch_page_write(&self, tid: TransactionId, page_id: PageId) -> Result<PageWriteGuard> {
        self.lock_page(tid, page_id, LockMode::Exclusive)?;
        let frame = self.pin_page(page_id)?;
        Ok(PageWriteGuard::new(frame))
    }

    /// Scan every tuple of a table as `tid`.
    pub fn scan(&self, tid: TransactionId, table_id: TableId) -> Result<HeapFileIterator<'_>> {
        Ok(HeapFileIterator::new(self, self.table(table_id)?, tid))
    }

    // ========================================================================
    // Public API: Tuple mutation
    // ========================================================================

    /// Insert `tuple` into a table on behalf of `tid`.
    ///
    /// The modified page stays in the cache, dirty, until `tid` completes.
    pub fn insert_tuple(&self, tid: TransactionId, table_id: TableId, tuple: Tuple) -> Result<()> {
        let file = self.table(table_id)?;
        let modified = file.insert_tuple(self, tid, tuple)?;
        self.recache(tid, &modified)
    }

    /// Delete `tuple` (located by its record id) on behalf of `tid`.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| Error::TupleNotFound(format!("tuple ({}) has no record id", tuple)))?;
        let file = self.table(rid.page_id.table_id())?;
        let modified = file.delete_tuple(self, tid, tuple)?;
        self.recache(tid, &modified)
    }

    /// Make sure every page a mutation reported is cached and marked dirty
    /// by `tid`.
    fn recache(&self, tid: TransactionId, modified: &[PageId]) -> Result<()> {
        for &page_id in modified {
            let mut page = self.fetch_page_write(tid, page_id)?;
            page.mark_dirty(Some(tid));
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Transactions
    // ========================================================================

    /// Commit or abort `tid`, then release all of its locks.
    ///
    /// Commit writes every dirty page `tid` holds a lock on back to its heap
    /// file. Abort drops those pages from the cache so the next reader sees
    /// the on-disk version. Locks are released only after that, so no other
    /// transaction can see a page whose fate isn't settled.
    ///
    /// Every guard `tid` obtained must be dropped before calling this.
    ///
    /// # Errors
    /// I/O errors while flushing a commit. The locks are then kept so the
    /// caller can abort instead.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        if commit {
            self.flush_pages(tid)?;
        } else {
            let mut pages: Vec<PageId> = self.lock_manager.pages_held_by(tid).into_iter().collect();
            pages.sort();
            for page_id in pages {
                self.discard_page(page_id);
            }
        }

        self.lock_manager.release_all(tid);
        debug!("{} {}", tid, if commit { "committed" } else { "aborted" });
        Ok(())
    }

    /// Whether `tid` holds a lock on `page_id`.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds(page_id, tid)
    }

    /// Release one page lock outside the commit/abort protocol.
    ///
    /// Breaks two-phase locking; only for callers that guarantee
    /// consistency themselves.
    pub fn unsafe_release_page(&self, tid: TransactionId, page_id: PageId) {
        self.lock_manager.release(page_id, tid);
    }

    // ========================================================================
    // Public API: Flush and discard
    // ========================================================================

    /// Drop a page from the cache without writing it.
    ///
    /// Any uncommitted change on it is lost. Does nothing if not cached.
    pub fn discard_page(&self, page_id: PageId) {
        let mut cache = self.cache.lock();
        if cache.frames.remove(&page_id).is_some() {
            cache.replacer.remove(page_id);
            debug_assert_eq!(cache.replacer.size(), cache.frames.len());
            self.stats.pages_discarded.fetch_add(1, Ordering::Relaxed);
            trace!("discarded {}", page_id);
        }
    }

    /// Write a cached page back if dirty, and mark it clean.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame = self.cache.lock().frames.get(&page_id).cloned();
        match frame {
            Some(frame) => self.flush_frame(&frame),
            None => Ok(()), // Page not in pool
        }
    }

    /// Write back every dirty page `tid` holds a lock on.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        let mut pages: Vec<PageId> = self.lock_manager.pages_held_by(tid).into_iter().collect();
        pages.sort();
        for page_id in pages {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Write back every dirty page in the pool.
    ///
    /// This persists uncommitted changes, which NO-STEAL otherwise never
    /// does. Meant for shutdown and tests.
    pub fn flush_all_pages(&self) -> Result<()> {
        let frames: Vec<Arc<Frame>> = self.cache.lock().frames.values().cloned().collect();
        for frame in frames {
            self.flush_frame(&frame)?;
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Maximum number of cached pages.
    pub fn capacity(&self) -> usize {
        self.config.pool_pages
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    /// Number of pages currently cached.
    pub fn cached_page_count(&self) -> usize {
        self.cache.lock().frames.len()
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.cache.lock().frames.contains_key(&page_id)
    }

    /// Pin count of a cached page, or None if not cached.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.cache.lock().frames.get(&page_id).map(|f| f.pin_count())
    }

    // ========================================================================
    // Internal: Locking
    // ========================================================================

    fn lock_page(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<()> {
        self.lock_manager.acquire(page_id, tid, mode).map_err(|e| {
            if matches!(e, Error::Deadlock { .. }) {
                self.stats.deadlocks.fetch_add(1, Ordering::Relaxed);
            }
            e
        })
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    /// Find or load a page and pin it. The caller already holds its lock.
    fn pin_page(&self, page_id: PageId) -> Result<Arc<Frame>> {
        let mut cache = self.cache.lock();

        // Cache hit
        if let Some(frame) = cache.frames.get(&page_id) {
            frame.pin();
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            trace!("cache hit {}", page_id);
            return Ok(Arc::clone(frame));
        }

        // Cache miss: read first so a bad page id evicts nothing
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let page = self.table(page_id.table_id())?.read_page(page_id)?;
        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        if cache.frames.len() >= self.config.pool_pages {
            self.evict_page(&mut cache)?;
        }

        let frame = Arc::new(Frame::new(page));
        frame.pin();
        cache.frames.insert(page_id, Arc::clone(&frame));
        cache.replacer.record_load(page_id);
        debug_assert_eq!(cache.replacer.size(), cache.frames.len());
        debug!("loaded {} ({} cached)", page_id, cache.frames.len());

        Ok(frame)
    }

    // ========================================================================
    // Internal: Eviction
    // ========================================================================

    /// Drop the oldest clean, unpinned page. Nothing is written: a clean page
    /// already matches its file.
    fn evict_page(&self, cache: &mut PageCache) -> Result<()> {
        let PageCache { frames, replacer } = cache;
        let victim = replacer.evict(|pid| frames.get(pid).is_some_and(|f| f.is_evictable()));

        match victim {
            Some(page_id) => {
                frames.remove(&page_id);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("evicted {}", page_id);
                Ok(())
            }
            None => {
                warn!(
                    "no clean page to evict: {} pages dirty or pinned",
                    frames.len()
                );
                Err(Error::CapacityExhausted {
                    capacity: self.config.pool_pages,
                })
            }
        }
    }

    /// Write a frame back if dirty.
    fn flush_frame(&self, frame: &Frame) -> Result<()> {
        if !frame.page().is_dirty() {
            return Ok(());
        }

        let mut page = frame.page_mut();
        if page.is_dirty() {
            self.table(page.page_id().table_id())?.write_page(&page)?;
            page.mark_dirty(None);
            self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
            trace!("flushed {}", page.page_id());
        }
        Ok(())
    }
}
