//! Slot geometry of a heap page.
//!
//! # Layout
//! ```text
//! ┌──────────────────┬─────────┬─────────┬─────┬───────────┬─────────┐
//! │ header bitmap    │ slot 0  │ slot 1  │ ... │ slot N-1  │ padding │
//! │ ceil(N / 8) bytes│ width B │ width B │     │ width B   │ zeros   │
//! └──────────────────┴─────────┴─────────┴─────┴───────────┴─────────┘
//! ```
//!
//! Each slot costs `width * 8` bits of data plus one header bit, so
//! `N = floor(page_size * 8 / (width * 8 + 1))`. The bit for slot `i` is
//! bit `i % 8` (least significant first) of header byte `i / 8`.

use crate::common::{Error, Result};

/// Slot geometry for one (page size, tuple width) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    page_size: usize,
    tuple_width: usize,
    num_slots: usize,
    header_len: usize,
}

impl PageLayout {
    /// Compute the layout.
    ///
    /// # Errors
    /// `Error::TupleTooWide` if not even one slot fits.
    pub fn new(page_size: usize, tuple_width: usize) -> Result<Self> {
        let num_slots = if tuple_width == 0 {
            0
        } else {
            (page_size * 8) / (tuple_width * 8 + 1)
        };
        if num_slots == 0 {
            return Err(Error::TupleTooWide {
                width: tuple_width,
                page_size,
            });
        }

        Ok(Self {
            page_size,
            tuple_width,
            num_slots,
            header_len: num_slots.div_ceil(8),
        })
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn tuple_width(&self) -> usize {
        self.tuple_width
    }

    /// Slots per page.
    #[inline]
    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Bytes taken by the occupancy bitmap.
    #[inline]
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Byte range of slot `slot` within the page.
    #[inline]
    pub fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let start = self.header_len + slot * self.tuple_width;
        start..start + self.tuple_width
    }

    /// Read the occupancy bit of `slot` from a header bitmap.
    #[inline]
    pub fn is_bit_set(header: &[u8], slot: usize) -> bool {
        header[slot / 8] & (1 << (slot % 8)) != 0
    }

    /// Write the occupancy bit of `slot` into a header bitmap.
    #[inline]
    pub fn set_bit(header: &mut [u8], slot: usize, used: bool) {
        let mask = 1u8 << (slot % 8);
        if used {
            header[slot / 8] |= mask;
        } else {
            header[slot / 8] &= !mask;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_page_geometry() {
        // Two int columns: 8 bytes per tuple.
        let layout = PageLayout::new(4096, 8).unwrap();
        assert_eq!(layout.num_slots(), 504);
        assert_eq!(layout.header_len(), 63);
        assert!(layout.header_len() + layout.num_slots() * 8 <= 4096);
    }

    #[test]
    fn test_slot_range() {
        let layout = PageLayout::new(4096, 8).unwrap();
        assert_eq!(layout.slot_range(0), 63..71);
        assert_eq!(layout.slot_range(2), 79..87);
    }

    #[test]
    fn test_too_wide() {
        assert!(matches!(
            PageLayout::new(64, 64),
            Err(Error::TupleTooWide { width: 64, page_size: 64 })
        ));
        // 63 bytes + 1 header bit fits in 64 bytes
        assert_eq!(PageLayout::new(64, 63).unwrap().num_slots(), 1);
    }

    #[test]
    fn test_bitmap_bits_lsb_first() {
        let mut header = [0u8; 2];
        PageLayout::set_bit(&mut header, 0, true);
        PageLayout::set_bit(&mut header, 9, true);
        assert_eq!(header, [0b0000_0001, 0b0000_0010]);

        assert!(PageLayout::is_bit_set(&header, 0));
        assert!(!PageLayout::is_bit_set(&header, 1));
        assert!(PageLayout::is_bit_set(&header, 9));

        PageLayout::set_bit(&mut header, 0, false);
        assert_eq!(header[0], 0);
    }
}
