//! Application assembly: startup sequence and router.

use std::sync::Arc;

use axum::{Router, extract::Request, middleware};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::bootstrap::{self, RetryPolicy};
use crate::config::AppConfig;
use crate::db::{self, Database};
use crate::error::StartupError;
use crate::middleware::{create_session_layer, csrf_middleware, request_id_middleware};
use crate::routes;
use crate::services::{Notifier, SmtpNotifier};
use crate::state::AppState;

/// Resolve, connect, bootstrap and synchronize the database, then build
/// the application state.
///
/// # Errors
///
/// Returns the first `StartupError`; every one of them is fatal.
pub async fn prepare(config: AppConfig, policy: RetryPolicy) -> Result<AppState, StartupError> {
    tracing::info!(
        base_path = %config.base_path,
        site_root_url = %config.site_root_url,
        "Loaded site settings"
    );

    let descriptor = db::resolve(&config.database, config.deployment)?;
    tracing::info!(
        backend = %descriptor.backend(),
        deployment = %config.deployment,
        uri = %descriptor.redacted(),
        "Database resolved"
    );

    let database = Database::open(&descriptor)?;
    bootstrap::ensure_database(&database, policy).await?;
    db::synchronize(&database, config.deployment).await?;

    let notifier = match &config.email {
        Some(email) => {
            let notifier: Arc<dyn Notifier> = Arc::new(SmtpNotifier::new(email)?);
            Some(notifier)
        }
        None if !config.email_missing.is_empty() => {
            tracing::warn!(
                missing = ?config.email_missing,
                "SMTP partially configured, email form disabled"
            );
            None
        }
        None => {
            tracing::info!("SMTP not configured, email form disabled");
            None
        }
    };

    Ok(AppState::new(config, database, notifier))
}

/// Build the router with its middleware stack.
pub fn create_app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());
    let static_dir = state.config().static_dir.clone();

    // Sessions and CSRF only wrap the pages; health checks and static files
    // never create sessions.
    let pages = routes::routes()
        .layer(middleware::from_fn(csrf_middleware))
        .layer(session_layer);

    Router::new()
        .merge(pages)
        .merge(routes::health_routes())
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
