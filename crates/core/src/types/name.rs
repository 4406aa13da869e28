//! User display name type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`UserName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UserNameError {
    /// The input is empty once surrounding whitespace is removed.
    #[error("name cannot be empty")]
    Empty,
    /// The input is longer than the storage column allows.
    #[error("name must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length in characters.
        max: usize,
    },
}

/// A user name as submitted through the register form.
///
/// ## Constraints
///
/// - Surrounding whitespace is trimmed before validation
/// - Must not be empty after trimming
/// - At most 255 characters (the `VARCHAR(255)` column on both backends)
///
/// ## Examples
///
/// ```
/// use roster_core::UserName;
///
/// assert_eq!(UserName::parse("  Alice ").unwrap().as_str(), "Alice");
/// assert!(UserName::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct UserName(String);

impl UserName {
    /// Maximum length of a name, in characters.
    pub const MAX_LENGTH: usize = 255;

    /// Parse a `UserName` from raw form input.
    ///
    /// # Errors
    ///
    /// Returns [`UserNameError::Empty`] for blank input and
    /// [`UserNameError::TooLong`] past [`Self::MAX_LENGTH`] characters.
    pub fn parse(s: &str) -> Result<Self, UserNameError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(UserNameError::Empty);
        }

        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(UserNameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
