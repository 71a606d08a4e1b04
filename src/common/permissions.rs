//! Page access permissions.

use std::fmt;

/// The access level a transaction asks for when fetching a page.
///
/// `ReadOnly` maps to a shared lock, `ReadWrite` to an exclusive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permissions::ReadOnly => write!(f, "READ_ONLY"),
            Permissions::ReadWrite => write!(f, "READ_WRITE"),
        }
    }
}
