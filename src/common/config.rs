//! Configuration constants and tunables for heapstore.

use std::time::Duration;

/// Default size of a page in bytes (4KB).
///
/// A page size is fixed for the lifetime of a heap file: page `i` always
/// occupies bytes `[i * page_size, (i + 1) * page_size)`.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default buffer pool capacity, in pages.
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Tunables for a [`BufferPoolManager`](crate::buffer::BufferPoolManager).
///
/// `page_size` only exists so tests can shrink pages; production files use
/// [`DEFAULT_PAGE_SIZE`].
///
/// # Example
/// ```
/// use heapstore::StorageConfig;
/// use std::time::Duration;
///
/// let config = StorageConfig::default()
///     .with_pool_pages(8)
///     .with_lock_timeout(Duration::from_secs(1));
/// assert_eq!(config.pool_pages, 8);
/// assert_eq!(config.page_size, 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    /// Bytes per page, including the slot header.
    pub page_size: usize,
    /// Maximum number of pages cached at once.
    pub pool_pages: usize,
    /// Upper bound on a single lock wait. `None` waits until granted or
    /// deadlocked.
    pub lock_timeout: Option<Duration>,
}

impl StorageConfig {
    /// Override the page size. Test use only.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the buffer pool capacity in pages.
    pub fn with_pool_pages(mut self, pool_pages: usize) -> Self {
        self.pool_pages = pool_pages;
        self
    }

    /// Bound every lock wait by `timeout`.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_pages: DEFAULT_POOL_PAGES,
            lock_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(DEFAULT_PAGE_SIZE.is_power_of_two());
        assert_eq!(DEFAULT_PAGE_SIZE, 4096);
    }

    #[test]
    fn test_config_builders() {
        let config = StorageConfig::default()
            .with_page_size(512)
            .with_pool_pages(4)
            .with_lock_timeout(Duration::from_millis(50));

        assert_eq!(config.page_size, 512);
        assert_eq!(config.pool_pages, 4);
        assert_eq!(config.lock_timeout, Some(Duration::from_millis(50)));
        assert_eq!(StorageConfig::default().lock_timeout, None);
    }
}
