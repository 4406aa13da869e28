//! User domain type.

use serde::Serialize;

use roster_core::UserId;

/// A registered user.
///
/// Names are validated by [`roster_core::UserName`] before insertion, so a
/// `User` read back from storage always has a non-empty name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Auto-assigned, monotonic per backend.
    pub id: UserId,
    pub name: String,
}
