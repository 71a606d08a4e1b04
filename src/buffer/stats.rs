//! Counters for cache behaviour and lock outcomes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by [`BufferPoolManager`](crate::BufferPoolManager).
///
/// Every counter is an independent atomic updated with `Ordering::Relaxed`;
/// a snapshot taken under concurrent load may mix counts from slightly
/// different moments.
///
/// # Example
/// ```
/// use heapstore::BufferPoolStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = BufferPoolStats::new();
/// stats.cache_hits.fetch_add(3, Ordering::Relaxed);
/// stats.cache_misses.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().hit_rate(), 0.75);
/// ```
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    /// Page requests served from the cache.
    pub cache_hits: AtomicU64,

    /// Page requests that had to go to a heap file.
    pub cache_misses: AtomicU64,

    /// Clean pages dropped to make room.
    pub evictions: AtomicU64,

    pub pages_read: AtomicU64,

    /// Dirty pages written back by commit or an explicit flush.
    pub pages_written: AtomicU64,

    /// Pages dropped by abort or `discard_page`, changes and all.
    pub pages_discarded: AtomicU64,

    /// Page requests refused because they would close a wait cycle.
    pub deadlocks: AtomicU64,
}

impl BufferPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self) -> [&AtomicU64; 7] {
        [
            &self.cache_hits,
            &self.cache_misses,
            &self.evictions,
            &self.pages_read,
            &self.pages_written,
            &self.pages_discarded,
            &self.deadlocks,
        ]
    }

    /// Copy every counter out.
    pub fn snapshot(&self) -> StatsSnapshot {
        let [cache_hits, cache_misses, evictions, pages_read, pages_written, pages_discarded, deadlocks] =
            self.counters().map(|c| c.load(Ordering::Relaxed));
        StatsSnapshot {
            cache_hits,
            cache_misses,
            evictions,
            pages_read,
            pages_written,
            pages_discarded,
            deadlocks,
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in self.counters() {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Plain copy of the counters, for logging and assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub pages_discarded: u64,
    pub deadlocks: u64,
}

impl StatsSnapshot {
    /// Fraction of page requests served from the cache; 0.0 before any.
    pub fn hit_rate(&self) -> f64 {
        match self.cache_hits + self.cache_misses {
            0 => 0.0,
            total => self.cache_hits as f64 / total as f64,
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} ({:.1}% hit) evicted={} read={} written={} discarded={} deadlocks={}",
            self.cache_hits,
            self.cache_misses,
            self.hit_rate() * 100.0,
            self.evictions,
            self.pages_read,
            self.pages_written,
            self.pages_discarded,
            self.deadlocks,
        )
    }
}
