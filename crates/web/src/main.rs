//! Roster - user registry and mail form.
//!
//! This binary serves the application on port 5000 by default.
//!
//! # Startup
//!
//! 1. Load configuration (`key/.env`, `.env`, environment)
//! 2. Initialize logging and Sentry
//! 3. Resolve the database from `ENV_DB`/`ENV_TYPE`, wait for it, migrate
//! 4. Synchronize the schema
//! 5. Serve until Ctrl+C or SIGTERM, then close the pool
//!
//! Any failure before serving is logged with its full cause chain and the
//! process exits with status 1.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use roster_web::bootstrap::RetryPolicy;
use roster_web::config::AppConfig;
use roster_web::error::{StartupError, error_chain};
use roster_web::{create_app, prepare, telemetry};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration from environment (needed for Sentry init)
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => return fail(&StartupError::from(e)),
    };

    let _telemetry = match telemetry::init(&config) {
        Ok(guard) => guard,
        Err(e) => return fail(&StartupError::from(e)),
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

async fn run(config: AppConfig) -> Result<(), StartupError> {
    if config.secret_key_is_default {
        tracing::warn!("SECRET_KEY is not set, using the development default");
    }

    let addr = config.socket_addr();
    let state = prepare(config, RetryPolicy::default()).await?;
    let database = state.database().clone();
    let app = create_app(state);

    tracing::info!("roster listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    database.close().await;
    served?;
    Ok(())
}

/// Log the error chain, mirror it to stderr and pick the exit status.
#[allow(clippy::print_stderr)]
fn fail(err: &StartupError) -> ExitCode {
    let chain = error_chain(err);
    tracing::error!(error = %chain, "Startup failed");
    eprintln!("roster-web: {chain}");
    ExitCode::FAILURE
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
