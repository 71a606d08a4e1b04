//! Heap page types and layout.
//!
//! This module contains:
//! - [`HeapPage`] - Decoded page: occupancy plus tuples, with a dirty mark
//! - [`PageLayout`] - Slot geometry and header bitmap for a given schema

mod heap_page;
mod layout;

pub use heap_page::HeapPage;
pub use layout::PageLayout;
