//! Heap File - a table's pages stored back to back in one file.
//!
//! The [`HeapFile`] handles:
//! - Reading and writing whole pages at fixed offsets
//! - Appending empty pages
//! - Choosing the page a new tuple goes to, and freeing deleted slots

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::{Error, PageId, Result, TableId, TransactionId};
use crate::storage::page::{HeapPage, PageLayout};
use crate::storage::tuple::{Tuple, TupleDesc};

/// One table's backing file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0   page_size  2×page_size  ...  N×page_size
/// ```
///
/// The file length is always a multiple of the page size, so the page count
/// is derived from it rather than stored.
///
/// # Thread Safety
/// The file handle sits behind a `Mutex`, so one `HeapFile` can be shared by
/// every transaction through an `Arc`. Tuple-level operations go through the
/// [`BufferPoolManager`] and take page locks there.
///
/// # Durability
/// Every page write is followed by `fsync` of the file data.
pub struct HeapFile {
    table_id: TableId,
    path: PathBuf,
    desc: Arc<TupleDesc>,
    layout: PageLayout,
    file: Mutex<File>,
}

impl HeapFile {
    /// Create a new, empty heap file.
    ///
    /// # Errors
    /// - `Error::TupleTooWide` if a tuple can't fit in a page
    /// - I/O error if the file already exists or can't be created
    pub fn create<P: AsRef<Path>>(
        path: P,
        table_id: TableId,
        desc: TupleDesc,
        page_size: usize,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        Self::from_file(file, path.as_ref(), table_id, desc, page_size)
    }

    /// Open an existing heap file.
    ///
    /// # Errors
    /// - `Error::TupleTooWide` if a tuple can't fit in a page
    /// - I/O error if the file doesn't exist or can't be opened
    pub fn open<P: AsRef<Path>>(
        path: P,
        table_id: TableId,
        desc: TupleDesc,
        page_size: usize,
    ) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        Self::from_file(file, path.as_ref(), table_id, desc, page_size)
    }

    fn from_file(
        file: File,
        path: &Path,
        table_id: TableId,
        desc: TupleDesc,
        page_size: usize,
    ) -> Result<Self> {
        let layout = PageLayout::new(page_size, desc.tuple_width())?;
        Ok(Self {
            table_id,
            path: path.to_path_buf(),
            desc: Arc::new(desc),
            layout,
            file: Mutex::new(file),
        })
    }

    #[inline]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.layout.page_size()
    }

    // ========================================================================
    // Page I/O
    // ========================================================================

    /// Number of whole pages in the file.
    pub fn num_pages(&self) -> Result<u32> {
        let len = self.file.lock().metadata()?.len();
        Ok((len / self.page_size() as u64) as u32)
    }

    /// Read and decode one page.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page belongs to another table or lies
    ///   beyond the end of the file
    /// - `Error::CorruptPage` if the bytes don't decode
    pub fn read_page(&self, page_id: PageId) -> Result<HeapPage> {
        if page_id.table_id() != self.table_id {
            return Err(Error::PageNotFound(page_id));
        }

        let offset = page_id.file_offset(self.page_size());
        let mut data = vec![0u8; self.page_size()];
        {
            let mut file = self.file.lock();
            let len = file.metadata()?.len();
            if offset + self.page_size() as u64 > len {
                return Err(Error::PageNotFound(page_id));
            }
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut data)?;
        }

        HeapPage::from_bytes(page_id, Arc::clone(&self.desc), self.layout, &data)
    }

    /// Write a page at its offset, extending the file if needed.
    ///
    /// # Errors
    /// `Error::PageNotFound` if the page belongs to another table.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let page_id = page.page_id();
        if page_id.table_id() != self.table_id {
            return Err(Error::PageNotFound(page_id));
        }
        self.write_at(page_id, &page.to_bytes())
    }

    /// Append an all-free page and return its id.
    pub fn append_empty_page(&self) -> Result<PageId> {
        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        let page_id = PageId::new(self.table_id, (len / self.page_size() as u64) as u32);

        file.seek(SeekFrom::Start(page_id.file_offset(self.page_size())))?;
        file.write_all(&HeapPage::empty_page_data(&self.layout))?;
        file.sync_data()?;

        debug!("appended {} to {}", page_id, self.path.display());
        Ok(page_id)
    }

    fn write_at(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_id.file_offset(self.page_size())))?;
        file.write_all(data)?;
        file.sync_data()?;
        Ok(())
    }

    // ========================================================================
    // Tuple mutation (through the buffer pool)
    // ========================================================================

    /// Insert `tuple` into the first page with a free slot, appending a new
    /// page when every existing one is full.
    ///
    /// Pages are fetched read-write through `pool`, so the scan takes
    /// exclusive locks as it goes. Returns the single page modified.
    ///
    /// # Errors
    /// - `Error::SchemaMismatch` if the tuple doesn't fit this table
    /// - Any lock or cache error from the pool
    pub fn insert_tuple(
        &self,
        pool: &BufferPoolManager,
        tid: TransactionId,
        tuple: Tuple,
    ) -> Result<Vec<PageId>> {
        self.desc.validate(&tuple)?;

        for page_no in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id, page_no);
            let mut page = pool.fetch_page_write(tid, page_id)?;
            if page.num_empty_slots() > 0 {
                page.insert_tuple(tuple)?;
                page.mark_dirty(Some(tid));
                return Ok(vec![page_id]);
            }
        }

        // Another transaction may claim a freshly appended page before we
        // lock it, so keep appending until one has room.
        loop {
            let page_id = self.append_empty_page()?;
            let mut page = pool.fetch_page_write(tid, page_id)?;
            if page.num_empty_slots() > 0 {
                page.insert_tuple(tuple)?;
                page.mark_dirty(Some(tid));
                return Ok(vec![page_id]);
            }
        }
    }

    /// Free the slot holding `tuple`, located by its record id.
    ///
    /// # Errors
    /// - `Error::TupleNotFound` if the tuple has no record id, belongs to
    ///   another table, or its slot is already free
    /// - Any lock or cache error from the pool
    pub fn delete_tuple(
        &self,
        pool: &BufferPoolManager,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageId>> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| Error::TupleNotFound(format!("tuple ({}) has no record id", tuple)))?;
        if rid.page_id.table_id() != self.table_id {
            return Err(Error::TupleNotFound(format!(
                "{} is not in {}",
                rid, self.table_id
            )));
        }

        let mut page = pool.fetch_page_write(tid, rid.page_id)?;
        page.delete_tuple(tuple)?;
        page.mark_dirty(Some(tid));
        Ok(vec![rid.page_id])
    }
}
