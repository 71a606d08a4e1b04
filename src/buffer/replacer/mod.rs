//! Eviction victim selection (replacers).
//!
//! Currently implements:
//! - [`FifoReplacer`] - Oldest-loaded page that the pool says is evictable

mod fifo;

pub use fifo::FifoReplacer;
