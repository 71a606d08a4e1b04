//! Lock Manager - shared/exclusive page locks with deadlock detection.
//!
//! The [`LockManager`] provides:
//! - Multi-reader / single-writer locks keyed by [`PageId`]
//! - In-place upgrade for a sole shared holder
//! - Blocking acquisition on a condition variable, with an optional timeout
//! - Wait-for cycle detection that fails the request closing a cycle

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::common::{Error, PageId, Result, TransactionId};

use super::wait_for::WaitForGraph;

/// Lock mode on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Read lock; any number of holders.
    Shared,
    /// Write lock; exactly one holder.
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "S"),
            LockMode::Exclusive => write!(f, "X"),
        }
    }
}

/// Lock on one page.
///
/// Invariant: `holders` is never empty, and has exactly one member when
/// `mode` is `Exclusive`.
#[derive(Debug)]
struct Lock {
    mode: LockMode,
    holders: HashSet<TransactionId>,
}

impl Lock {
    fn new(mode: LockMode, tid: TransactionId) -> Self {
        let mut holders = HashSet::new();
        holders.insert(tid);
        Self { mode, holders }
    }

    fn is_sole_holder(&self, tid: TransactionId) -> bool {
        self.holders.len() == 1 && self.holders.contains(&tid)
    }
}

/// Outcome of one acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Granted,
    /// Granted as an extra holder of a lock that already had others.
    /// Anyone waiting on the page now waits on one more transaction.
    Joined,
    Blocked,
}

impl Attempt {
    fn is_granted(self) -> bool {
        self != Attempt::Blocked
    }
}

/// Everything guarded by the lock manager's mutex.
#[derive(Debug, Default)]
struct LockTable {
    locks: HashMap<PageId, Lock>,
    /// Pages each transaction holds a lock on.
    held: HashMap<TransactionId, HashSet<PageId>>,
    waits: WaitForGraph,
}

impl LockTable {
    /// One non-blocking acquisition attempt.
    fn try_acquire(
        &mut self,
        page_id: PageId,
        tid: TransactionId,
        mode: LockMode,
    ) -> Result<Attempt> {
        let attempt = match self.locks.get_mut(&page_id) {
            None => {
                self.locks.insert(page_id, Lock::new(mode, tid));
                Attempt::Granted
            }
            Some(lock) if lock.mode != mode => {
                if lock.is_sole_holder(tid) {
                    // Upgrade in place. An exclusive holder asking for
                    // shared already has more than it needs.
                    if mode == LockMode::Exclusive {
                        lock.mode = LockMode::Exclusive;
                    }
                    Attempt::Granted
                } else {
                    Attempt::Blocked
                }
            }
            Some(lock) => match mode {
                LockMode::Shared => {
                    if lock.holders.insert(tid) {
                        Attempt::Joined
                    } else {
                        Attempt::Granted
                    }
                }
                LockMode::Exclusive if lock.is_sole_holder(tid) => Attempt::Granted,
                LockMode::Exclusive => Attempt::Blocked,
            },
        };

        if attempt.is_granted() {
            self.held.entry(tid).or_default().insert(page_id);
            self.waits.clear_waiting(tid);
            return Ok(attempt);
        }

        let holders: Vec<TransactionId> = self
            .locks
            .get(&page_id)
            .map(|lock| lock.holders.iter().copied().collect())
            .unwrap_or_default();
        self.waits.set_waiting(tid, holders);

        if self.waits.is_on_cycle(tid) {
            self.waits.clear_waiting(tid);
            return Err(Error::Deadlock { tid, page_id });
        }
        Ok(Attempt::Blocked)
    }

    /// Drop `tid` from the holders of `page_id`, destroying an emptied lock.
    fn release_lock(&mut self, page_id: PageId, tid: TransactionId) {
        if let Some(lock) = self.locks.get_mut(&page_id) {
            lock.holders.remove(&tid);
            if lock.holders.is_empty() {
                self.locks.remove(&page_id);
            }
        }
    }
}

/// Page-granularity lock table shared by every transaction.
///
/// # Architecture
/// ```text
/// ┌───────────────────────────────────────────────────────┐
/// │                     LockManager                       │
/// │  Mutex<LockTable>                                     │
/// │  ┌───────────────┐ ┌──────────────────┐ ┌──────────┐  │
/// │  │ locks         │ │ held             │ │ waits    │  │
/// │  │ PageId → Lock │ │ Txn → {PageId}   │ │ Txn→Txns │  │
/// │  └───────────────┘ └──────────────────┘ └──────────┘  │
/// │  Condvar `released` — notified on every release       │
/// └───────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// All three maps live behind one mutex, so every lock-table mutation is
/// serialized. Blocked requesters sleep on `released` and re-evaluate their
/// request each time some transaction gives a lock back.
pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
    timeout: Option<Duration>,
}

impl LockManager {
    /// Create a lock manager whose waits are bounded only by grant or
    /// deadlock.
    pub fn new() -> Self {
        Self::with_timeout(None)
    }

    /// Create a lock manager whose waits give up after `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            released: Condvar::new(),
            timeout,
        }
    }

    // ========================================================================
    // Public API: Acquire
    // ========================================================================

    /// Try once to lock `page_id` for `tid` without blocking.
    ///
    /// Returns `Ok(true)` if granted and `Ok(false)` if the lock is held in a
    /// conflicting mode. A refused request records wait-for edges from `tid`
    /// to the current holders.
    ///
    /// # Errors
    /// `Error::Deadlock` if waiting would close a cycle.
    pub fn try_acquire(&self, page_id: PageId, tid: TransactionId, mode: LockMode) -> Result<bool> {
        let mut table = self.table.lock();
        let attempt = table.try_acquire(page_id, tid, mode)?;
        drop(table);

        self.wake_if_joined(attempt);
        Ok(attempt.is_granted())
    }

    /// A new shared holder changes who every waiter on that page waits for.
    /// Waiters only rebuild their wait-for edges when woken, so wake them to
    /// redo the cycle check against the enlarged holder set.
    fn wake_if_joined(&self, attempt: Attempt) {
        if attempt == Attempt::Joined {
            self.released.notify_all();
        }
    }

    /// Lock `page_id` for `tid`, blocking until granted.
    ///
    /// # Errors
    /// - `Error::Deadlock` if `tid` ends up on a wait-for cycle; the caller
    ///   must abort the transaction
    /// - `Error::LockTimeout` if a timeout is configured and expires first
    pub fn acquire(&self, page_id: PageId, tid: TransactionId, mode: LockMode) -> Result<()> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut table = self.table.lock();

        loop {
            match table.try_acquire(page_id, tid, mode) {
                Ok(Attempt::Blocked) => {}
                Ok(attempt) => {
                    drop(table);
                    trace!("{} granted {} lock on {}", tid, mode, page_id);
                    self.wake_if_joined(attempt);
                    return Ok(());
                }
                Err(e) => {
                    warn!("{} deadlocked requesting {} lock on {}", tid, mode, page_id);
                    return Err(e);
                }
            }

            debug!("{} waiting for {} lock on {}", tid, mode, page_id);
            match deadline {
                None => self.released.wait(&mut table),
                Some(deadline) => {
                    if self.released.wait_until(&mut table, deadline).timed_out() {
                        // One last look: the release may have raced the timeout
                        let attempt = table.try_acquire(page_id, tid, mode)?;
                        if attempt.is_granted() {
                            drop(table);
                            self.wake_if_joined(attempt);
                            return Ok(());
                        }
                        table.waits.clear_waiting(tid);
                        warn!("{} timed out waiting for lock on {}", tid, page_id);
                        return Err(Error::LockTimeout { tid, page_id });
                    }
                }
            }
        }
    }

    // ========================================================================
    // Public API: Release
    // ========================================================================

    /// Release `tid`'s lock on `page_id` and drop its wait-for edges.
    pub fn release(&self, page_id: PageId, tid: TransactionId) {
        let mut table = self.table.lock();
        table.release_lock(page_id, tid);

        if let Some(pages) = table.held.get_mut(&tid) {
            pages.remove(&page_id);
            if pages.is_empty() {
                table.held.remove(&tid);
            }
        }
        table.waits.clear_waiting(tid);
        drop(table);

        self.released.notify_all();
    }

    /// Release every lock `tid` holds and remove it from the wait-for graph.
    pub fn release_all(&self, tid: TransactionId) {
        let mut table = self.table.lock();
        let pages = table.held.remove(&tid).unwrap_or_default();
        for page_id in &pages {
            table.release_lock(*page_id, tid);
        }
        table.waits.remove_transaction(tid);
        drop(table);

        debug!("{} released {} locks", tid, pages.len());
        self.released.notify_all();
    }

    // ========================================================================
    // Public API: Introspection
    // ========================================================================

    /// Whether `tid` holds any lock on `page_id`.
    pub fn holds(&self, page_id: PageId, tid: TransactionId) -> bool {
        self.table
            .lock()
            .locks
            .get(&page_id)
            .is_some_and(|lock| lock.holders.contains(&tid))
    }

    /// Pages `tid` currently holds locks on.
    pub fn pages_held_by(&self, tid: TransactionId) -> HashSet<PageId> {
        self.table.lock().held.get(&tid).cloned().unwrap_or_default()
    }

    /// Current mode of the lock on `page_id`, if locked.
    pub fn lock_mode(&self, page_id: PageId) -> Option<LockMode> {
        self.table.lock().locks.get(&page_id).map(|lock| lock.mode)
    }

    /// Number of pages with a live lock.
    pub fn locked_page_count(&self) -> usize {
        self.table.lock().locks.len()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
