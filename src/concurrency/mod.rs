//! Page-level locking for transactions.
//!
//! # Components
//! - [`LockManager`] - Shared/exclusive lock table with blocking acquisition
//! - [`WaitForGraph`] - Which transactions wait on which, for deadlock detection
//!
//! Locks follow strict two-phase locking: a transaction accumulates locks
//! while it runs and gives them all back at commit or abort.

mod lock_manager;
mod wait_for;

pub use lock_manager::{LockManager, LockMode};
pub use wait_for::WaitForGraph;
