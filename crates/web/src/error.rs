//! Unified error handling with Sentry integration.
//!
//! Handlers return `Result<T, AppError>`; server errors are captured to
//! Sentry before a generic response goes out. [`StartupError`] covers
//! everything that can stop the process before it serves.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::config::ConfigError;
use crate::db::{ConnectivityError, RepositoryError, SchemaError};
use crate::services::EmailError;
use crate::telemetry::TelemetryError;

/// Application-level error type for request handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// A dependency is not ready to serve.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Database(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) => "Internal server error".to_string(),
            Self::Unavailable(_) => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Anything that stops the server before (or while) it serves.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging setup failed: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("cannot open database: {0}")]
    Connectivity(#[from] ConnectivityError),

    #[error("database bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("schema synchronization failed: {0}")]
    Schema(#[from] SchemaError),

    #[error("mailer setup failed: {0}")]
    Email(#[from] EmailError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Render `err` and its sources as `outer: cause: root`.
#[must_use]
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        // thiserror messages often embed their source already.
        if !out.ends_with(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::Unavailable("db".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::DataCorruption(
                "bad row".to_string()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unavailable_names_the_dependency() {
        let err = AppError::Unavailable("database".to_string());
        assert_eq!(err.to_string(), "Service unavailable: database");
    }

    #[test]
    fn test_error_chain_includes_root_cause() {
        let err = StartupError::Bootstrap(BootstrapError::RetriesExhausted {
            attempts: 5,
            last_error: crate::bootstrap::AttemptError::Connectivity(
                ConnectivityError::MissingUri {
                    var: "DATABASE_URI_DOCKER",
                },
            ),
        });

        let chain = error_chain(&err);
        assert!(chain.starts_with("database bootstrap failed"));
        assert!(chain.contains("after 5 attempts"));
        assert!(chain.ends_with("DATABASE_URI_DOCKER is not set"));
    }
}
