//! Session-stored types.
//!
//! Everything the application keeps in the session cookie's backing store:
//! the queued flash messages and the CSRF token.

use serde::{Deserialize, Serialize};

/// Severity of a flash message, used as its CSS class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
}

impl FlashLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }
}

/// Session keys.
pub mod keys {
    /// Queue of pending [`super::Flash`] messages.
    pub const FLASHES: &str = "_flashes";

    /// Per-session CSRF token.
    pub const CSRF_TOKEN: &str = "csrf_token";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_level_serializes_lowercase() {
        let json = serde_json::to_string(&Flash::error("boom")).unwrap();
        assert_eq!(json, r#"{"level":"error","message":"boom"}"#);
    }
}
