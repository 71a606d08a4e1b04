//! Storage layer - heap files, page layout and tuples.
//!
//! This module handles persistent storage:
//! - [`HeapFile`] - One table's pages in one file, plus insert/delete policy
//! - [`HeapFileIterator`] - Restartable scan over a table's tuples
//! - [`page`] - Heap page layout and codec
//! - [`Tuple`], [`TupleDesc`] - Rows and schemas

mod heap_file;
mod iterator;
pub mod page;
mod tuple;

pub use heap_file::HeapFile;
pub use iterator::HeapFileIterator;
pub use tuple::{Field, FieldType, RecordId, Tuple, TupleDesc};
