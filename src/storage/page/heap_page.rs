//! HeapPage - the decoded form of one page of a heap file.
//!
//! A [`HeapPage`] owns one tuple per occupied slot. It converts to and from
//! the on-disk byte image described in [`PageLayout`], and carries the dirty
//! mark used by the buffer pool's NO-STEAL eviction.

use std::sync::Arc;

use crate::common::{Error, PageId, Result, TransactionId};
use crate::storage::tuple::{RecordId, Tuple, TupleDesc};

use super::layout::PageLayout;

/// One page of a heap file.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use heapstore::storage::page::{HeapPage, PageLayout};
/// use heapstore::storage::{FieldType, Tuple, TupleDesc};
/// use heapstore::{PageId, TableId};
///
/// let desc = Arc::new(TupleDesc::new(vec![FieldType::Int]));
/// let layout = PageLayout::new(4096, desc.tuple_width()).unwrap();
/// let mut page = HeapPage::new_empty(PageId::new(TableId::new(0), 0), desc, layout);
///
/// let rid = page.insert_tuple(Tuple::new(vec![42.into()])).unwrap();
/// assert_eq!(rid.slot, 0);
/// assert_eq!(page.num_empty_slots(), layout.num_slots() - 1);
/// ```
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    desc: Arc<TupleDesc>,
    layout: PageLayout,
    /// `None` for a free slot.
    slots: Vec<Option<Tuple>>,
    /// Transaction with uncommitted changes on this page, if any.
    dirtied_by: Option<TransactionId>,
}

impl HeapPage {
    /// Create a page with every slot free.
    pub fn new_empty(page_id: PageId, desc: Arc<TupleDesc>, layout: PageLayout) -> Self {
        Self {
            page_id,
            desc,
            slots: vec![None; layout.num_slots()],
            layout,
            dirtied_by: None,
        }
    }

    /// Byte image of an all-free page.
    pub fn empty_page_data(layout: &PageLayout) -> Vec<u8> {
        vec![0u8; layout.page_size()]
    }

    /// Decode a page image.
    ///
    /// Bytes in free slots are ignored.
    ///
    /// # Errors
    /// `Error::CorruptPage` if `data` has the wrong length or an occupied
    /// slot fails to decode.
    pub fn from_bytes(
        page_id: PageId,
        desc: Arc<TupleDesc>,
        layout: PageLayout,
        data: &[u8],
    ) -> Result<Self> {
        if data.len() != layout.page_size() {
            return Err(Error::CorruptPage {
                page_id,
                reason: format!("expected {} bytes, got {}", layout.page_size(), data.len()),
            });
        }

        let header = &data[..layout.header_len()];
        let mut slots = Vec::with_capacity(layout.num_slots());
        for slot in 0..layout.num_slots() {
            if !PageLayout::is_bit_set(header, slot) {
                slots.push(None);
                continue;
            }
            let mut tuple = desc
                .decode(&data[layout.slot_range(slot)])
                .map_err(|reason| Error::CorruptPage {
                    page_id,
                    reason: format!("slot {}: {}", slot, reason),
                })?;
            tuple.set_record_id(Some(RecordId::new(page_id, slot)));
            slots.push(Some(tuple));
        }

        Ok(Self {
            page_id,
            desc,
            layout,
            slots,
            dirtied_by: None,
        })
    }

    /// Encode this page into its on-disk image.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Self::empty_page_data(&self.layout);
        let header_len = self.layout.header_len();

        for (slot, tuple) in self.slots.iter().enumerate() {
            if let Some(tuple) = tuple {
                PageLayout::set_bit(&mut data[..header_len], slot, true);
                self.desc.encode(tuple, &mut data[self.layout.slot_range(slot)]);
            }
        }
        data
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    #[inline]
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn num_empty_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        matches!(self.slots.get(slot), Some(Some(_)))
    }

    /// Store `tuple` in the first free slot and return its new location.
    ///
    /// # Errors
    /// - `Error::SchemaMismatch` if the tuple doesn't fit the page's schema
    /// - `Error::PageFull` if no slot is free
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> Result<RecordId> {
        self.desc.validate(&tuple)?;

        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::PageFull(self.page_id))?;

        let rid = RecordId::new(self.page_id, slot);
        tuple.set_record_id(Some(rid));
        self.slots[slot] = Some(tuple);
        Ok(rid)
    }

    /// Free the slot named by `tuple`'s record id.
    ///
    /// # Errors
    /// `Error::TupleNotFound` if the tuple has no record id, lives on another
    /// page, or its slot is already free.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| Error::TupleNotFound(format!("tuple ({}) has no record id", tuple)))?;

        if rid.page_id != self.page_id {
            return Err(Error::TupleNotFound(format!(
                "{} is not on {}",
                rid, self.page_id
            )));
        }

        match self.slots.get_mut(rid.slot) {
            Some(slot @ Some(_)) => {
                *slot = None;
                Ok(())
            }
            _ => Err(Error::TupleNotFound(format!("slot {} is free", rid))),
        }
    }

    /// Occupied slots in slot order.
    pub fn tuples(&self) -> impl Iterator<Item = &Tuple> {
        self.slots.iter().flatten()
    }

    /// Set or clear the dirty mark.
    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirtied_by = tid;
    }

    /// Transaction that last dirtied this page, or `None` if clean.
    #[inline]
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirtied_by.is_some()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;
    use crate::storage::tuple::{Field, FieldType};
    use proptest::prelude::*;

    fn desc() -> Arc<TupleDesc> {
        Arc::new(TupleDesc::new(vec![FieldType::Int, FieldType::Str(6)]))
    }

    fn pid(n: u32) -> PageId {
        PageId::new(TableId::new(1), n)
    }

    fn empty_page(page_size: usize) -> HeapPage {
        let desc = desc();
        let layout = PageLayout::new(page_size, desc.tuple_width()).unwrap();
        HeapPage::new_empty(pid(0), desc, layout)
    }

    fn row(i: i32) -> Tuple {
        Tuple::new(vec![Field::Int(i), Field::Str(format!("r{}", i))])
    }

    #[test]
    fn test_empty_page() {
        let page = empty_page(4096);
        assert_eq!(page.num_empty_slots(), page.num_slots());
        assert!(!page.is_dirty());
        assert_eq!(page.tuples().count(), 0);
        assert!(page.to_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_insert_fills_lowest_slot() {
        let mut page = empty_page(4096);
        assert_eq!(page.insert_tuple(row(0)).unwrap().slot, 0);
        assert_eq!(page.insert_tuple(row(1)).unwrap().slot, 1);

        let first = page.tuples().next().unwrap().clone();
        page.delete_tuple(&first).unwrap();
        assert!(!page.is_slot_used(0));

        // The freed slot is reused before any later one
        assert_eq!(page.insert_tuple(row(2)).unwrap().slot, 0);
    }

    #[test]
    fn test_insert_into_full_page() {
        let mut page = empty_page(128);
        for i in 0..page.num_slots() {
            page.insert_tuple(row(i as i32)).unwrap();
        }
        assert_eq!(page.num_empty_slots(), 0);
        assert!(matches!(page.insert_tuple(row(99)), Err(Error::PageFull(_))));
    }

    #[test]
    fn test_insert_rejects_wrong_schema() {
        let mut page = empty_page(4096);
        let bad = Tuple::new(vec![Field::Int(1)]);
        assert!(matches!(page.insert_tuple(bad), Err(Error::SchemaMismatch(_))));
        assert_eq!(page.num_empty_slots(), page.num_slots());
    }

    #[test]
    fn test_delete_errors() {
        let mut page = empty_page(4096);

        // No record id
        assert!(page.delete_tuple(&row(1)).is_err());

        // Record id on another page
        let mut foreign = row(1);
        foreign.set_record_id(Some(RecordId::new(pid(7), 0)));
        assert!(page.delete_tuple(&foreign).is_err());

        // Double delete
        page.insert_tuple(row(1)).unwrap();
        let stored = page.tuples().next().unwrap().clone();
        page.delete_tuple(&stored).unwrap();
        assert!(matches!(page.delete_tuple(&stored), Err(Error::TupleNotFound(_))));
    }

    #[test]
    fn test_byte_layout() {
        let mut page = empty_page(4096);
        page.insert_tuple(row(1)).unwrap();
        page.insert_tuple(row(2)).unwrap();
        page.insert_tuple(row(3)).unwrap();
        let second = page.tuples().nth(1).unwrap().clone();
        page.delete_tuple(&second).unwrap();

        let data = page.to_bytes();
        assert_eq!(data.len(), 4096);
        assert_eq!(data[0], 0b0000_0101);

        let slot0 = page.layout().slot_range(0);
        assert_eq!(&data[slot0.start..slot0.start + 4], &[0, 0, 0, 1]);
        // A freed slot is written as zeros
        assert!(data[page.layout().slot_range(1)].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_from_bytes_sets_record_ids() {
        let mut page = empty_page(4096);
        page.insert_tuple(row(5)).unwrap();
        page.insert_tuple(row(6)).unwrap();

        let decoded =
            HeapPage::from_bytes(pid(0), desc(), *page.layout(), &page.to_bytes()).unwrap();
        let rids: Vec<_> = decoded.tuples().map(|t| t.record_id().unwrap()).collect();
        assert_eq!(rids, vec![RecordId::new(pid(0), 0), RecordId::new(pid(0), 1)]);
    }

    #[test]
    fn test_from_bytes_wrong_length() {
        let page = empty_page(4096);
        let result = HeapPage::from_bytes(pid(0), desc(), *page.layout(), &[0u8; 100]);
        assert!(matches!(result, Err(Error::CorruptPage { .. })));
    }

    #[test]
    fn test_free_slot_bytes_ignored() {
        let page = empty_page(4096);
        let mut data = page.to_bytes();
        // Garbage in slot 0's data while its bit stays clear
        let range = page.layout().slot_range(0);
        data[range].fill(0xEE);

        let decoded = HeapPage::from_bytes(pid(0), desc(), *page.layout(), &data).unwrap();
        assert_eq!(decoded.tuples().count(), 0);
    }

    #[test]
    fn test_dirty_mark() {
        let mut page = empty_page(4096);
        let tid = TransactionId::from_raw(3);
        page.mark_dirty(Some(tid));
        assert_eq!(page.dirtied_by(), Some(tid));
        page.mark_dirty(None);
        assert!(!page.is_dirty());
    }

    proptest! {
        #[test]
        fn prop_codec_round_trip(
            rows in proptest::collection::vec(
                proptest::option::of((any::<i32>(), "[a-z]{0,6}")),
                1..40,
            )
        ) {
            let desc = desc();
            let layout = PageLayout::new(1024, desc.tuple_width()).unwrap();
            let mut page = HeapPage::new_empty(pid(3), desc.clone(), layout);

            // Fill one slot per entry, then free the `None` entries
            let mut stored = Vec::new();
            for entry in rows.iter().take(layout.num_slots()) {
                let (v, s) = entry.clone().unwrap_or((0, String::new()));
                page.insert_tuple(Tuple::new(vec![Field::Int(v), Field::Str(s)])).unwrap();
                stored.push(entry.is_some());
            }
            let snapshot: Vec<Tuple> = page.tuples().cloned().collect();
            for (tuple, keep) in snapshot.iter().zip(&stored) {
                if !keep {
                    page.delete_tuple(tuple).unwrap();
                }
            }

            let decoded = HeapPage::from_bytes(pid(3), desc, layout, &page.to_bytes()).unwrap();
            for slot in 0..layout.num_slots() {
                prop_assert_eq!(decoded.is_slot_used(slot), page.is_slot_used(slot));
            }
            let before: Vec<&Tuple> = page.tuples().collect();
            let after: Vec<&Tuple> = decoded.tuples().collect();
            prop_assert_eq!(before, after);
        }
    }
}
