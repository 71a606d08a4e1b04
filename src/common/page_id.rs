//! Table and page identifier types.

use std::fmt;

/// Identifies a table (one heap file).
///
/// Issued monotonically by the buffer pool when a heap file is registered,
/// so two tables can never collide the way path-derived ids could.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl TableId {
    /// Create a new TableId.
    #[inline]
    pub fn new(id: u32) -> Self {
        TableId(id)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table({})", self.0)
    }
}

/// Identifies a page: its table plus a zero-based page number.
///
/// This is the only key used by the page cache and the lock table. Ordering
/// is table first, then page number, so sorted page sets read naturally.
///
/// # Example
/// ```
/// use heapstore::{PageId, TableId};
///
/// let page_id = PageId::new(TableId::new(3), 7);
/// assert_eq!(page_id.table_id(), TableId::new(3));
/// assert_eq!(page_id.page_no(), 7);
/// assert_eq!(page_id.file_offset(4096), 7 * 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    table_id: TableId,
    page_no: u32,
}

impl PageId {
    /// Create a new PageId.
    #[inline]
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        Self { table_id, page_no }
    }

    /// The table this page belongs to.
    #[inline]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Zero-based position of this page within its table.
    #[inline]
    pub fn page_no(&self) -> u32 {
        self.page_no
    }

    /// Byte offset of this page in its backing file.
    #[inline]
    pub fn file_offset(&self, page_size: usize) -> u64 {
        self.page_no as u64 * page_size as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({}:{})", self.table_id.0, self.page_no)
    }
}
