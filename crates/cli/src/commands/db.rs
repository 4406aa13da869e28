//! Database bootstrap commands.
//!
//! # Usage
//!
//! ```bash
//! roster-cli ensure-db --attempts 10 --backoff-secs 2
//! roster-cli init-db
//! ```

use std::time::Duration;

use roster_web::bootstrap::{self, BootstrapError, InitOutcome, RetryPolicy};
use roster_web::config::{AppConfig, ConfigError};
use roster_web::db::{self, ConnectivityError, Database};

/// Errors from the database commands.
#[derive(Debug, thiserror::Error)]
pub enum DbCommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connectivity(#[from] ConnectivityError),

    #[error("Bootstrap error: {0}")]
    Bootstrap(#[from] BootstrapError),
}

/// Retry until the database answers, then apply pending migrations.
///
/// # Errors
///
/// Returns an error if configuration is invalid or every attempt fails.
pub async fn ensure(attempts: u32, backoff_secs: u64) -> Result<(), DbCommandError> {
    let database = open()?;
    let policy = RetryPolicy {
        attempts,
        backoff: Duration::from_secs(backoff_secs),
    };

    let result = bootstrap::ensure_database(&database, policy).await;
    database.close().await;

    let used = result?;
    tracing::info!(attempts = used, "Database is ready");
    Ok(())
}

/// Migrate an empty schema; leave an initialized one alone.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the schema cannot be
/// inspected or migrated.
pub async fn init() -> Result<(), DbCommandError> {
    let database = open()?;

    let result = bootstrap::initialize_if_empty(&database).await;
    database.close().await;

    match result? {
        InitOutcome::Migrated => tracing::info!("Initialized empty database"),
        InitOutcome::AlreadyInitialized => tracing::info!("Database already initialized"),
    }
    Ok(())
}

fn open() -> Result<Database, DbCommandError> {
    let config = AppConfig::from_env()?;
    let descriptor = db::resolve(&config.database, config.deployment)?;

    tracing::info!(
        backend = %descriptor.backend(),
        deployment = %config.deployment,
        uri = %descriptor.redacted(),
        "Connecting to database..."
    );
    Ok(Database::open(&descriptor)?)
}
