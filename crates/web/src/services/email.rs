//! Outgoing email for the send-email form.
//!
//! Messages are plain text, sent from the configured address to itself over
//! TLS SMTP. There is no retry; the caller reports failure to the user.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

/// Port that uses implicit TLS; every other port upgrades with STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Upper bound on one SMTP exchange.
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Why a submitted form cannot become an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("subject is required")]
    MissingSubject,
    #[error("body is required")]
    MissingBody,
}

/// A validated subject/body pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    subject: String,
    body: String,
}

impl OutgoingEmail {
    /// Both fields must contain something other than whitespace.
    ///
    /// # Errors
    ///
    /// Returns the first missing field.
    pub fn compose(subject: &str, body: &str) -> Result<Self, ComposeError> {
        if subject.trim().is_empty() {
            return Err(ComposeError::MissingSubject);
        }
        if body.trim().is_empty() {
            return Err(ComposeError::MissingBody);
        }
        Ok(Self {
            subject: subject.trim().to_string(),
            body: body.to_string(),
        })
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Delivers an [`OutgoingEmail`].
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError>;
}

/// SMTP delivery to the configured mailbox.
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    mailbox: Mailbox,
}

impl fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("mailbox", &self.mailbox.to_string())
            .finish_non_exhaustive()
    }
}

impl SmtpNotifier {
    /// Build the transport. No connection is made until the first send.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Smtp` if the TLS parameters cannot be built and
    /// `EmailError::InvalidAddress` if the address is not a valid mailbox.
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let credentials = Credentials::new(
            config.address.as_str().to_string(),
            config.password.expose_secret().to_string(),
        );

        let builder = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        };

        let mailer = builder
            .port(config.smtp_port)
            .credentials(credentials)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        let mailbox = config
            .address
            .as_str()
            .parse::<Mailbox>()
            .map_err(|_| EmailError::InvalidAddress(config.address.to_string()))?;

        Ok(Self { mailer, mailbox })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[tracing::instrument(skip(self, email), fields(subject = %email.subject()))]
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(self.mailbox.clone())
            .to(self.mailbox.clone())
            .subject(email.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body().to_string())?;

        self.mailer.send(message).await?;

        tracing::info!("Email sent");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use roster_core::Email;
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn test_compose_requires_both_fields() {
        assert_eq!(
            OutgoingEmail::compose("  ", "hello"),
            Err(ComposeError::MissingSubject)
        );
        assert_eq!(
            OutgoingEmail::compose("Hi", "\n"),
            Err(ComposeError::MissingBody)
        );

        let email = OutgoingEmail::compose(" Hi ", "line one\nline two").unwrap();
        assert_eq!(email.subject(), "Hi");
        assert_eq!(email.body(), "line one\nline two");
    }

    #[test]
    fn test_notifier_builds_for_both_tls_modes() {
        for port in [465, 587] {
            let config = EmailConfig {
                smtp_host: "smtp.example.com".to_string(),
                smtp_port: port,
                address: Email::parse("me@example.com").unwrap(),
                password: SecretString::from("app-password"),
            };
            let notifier = SmtpNotifier::new(&config).unwrap();
            let debug = format!("{notifier:?}");
            assert!(debug.contains("me@example.com"));
            assert!(!debug.contains("app-password"));
        }
    }
}
