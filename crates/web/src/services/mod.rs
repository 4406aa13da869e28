//! Services for external integrations.

pub mod email;

pub use email::{ComposeError, EmailError, Notifier, OutgoingEmail, SmtpNotifier};
