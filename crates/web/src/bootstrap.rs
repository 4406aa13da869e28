//! Bootstrap sequencer.
//!
//! On a fresh container the MySQL server often comes up after the
//! application, so startup waits for the database with a bounded, fixed
//! backoff before migrating. [`initialize_if_empty`] is the one-shot variant
//! used by `roster-cli init-db`.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::{ConnectivityError, Database, SchemaError};

/// Bounded retry with fixed backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff: Duration::from_secs(3),
        }
    }
}

/// Why a single attempt failed.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Every attempt failed.
    #[error("database not ready after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last_error: AttemptError,
    },

    /// The table list could not be read.
    #[error("failed to inspect schema: {0}")]
    Inspect(#[source] sqlx::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Outcome of [`initialize_if_empty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Migrated,
    AlreadyInitialized,
}

/// What the sequencer needs from the database.
#[async_trait]
pub trait DatabaseProbe: Send + Sync {
    async fn ping(&self) -> Result<(), ConnectivityError>;

    async fn apply_migrations(&self) -> Result<(), SchemaError>;

    async fn list_tables(&self) -> Result<Vec<String>, sqlx::Error>;
}

#[async_trait]
impl DatabaseProbe for Database {
    async fn ping(&self) -> Result<(), ConnectivityError> {
        Self::ping(self).await
    }

    async fn apply_migrations(&self) -> Result<(), SchemaError> {
        Self::apply_migrations(self).await
    }

    async fn list_tables(&self) -> Result<Vec<String>, sqlx::Error> {
        Self::list_tables(self).await
    }
}

/// Wait for the database, then apply pending migrations.
///
/// Returns the number of attempts used.
///
/// # Errors
///
/// Returns `BootstrapError::RetriesExhausted` with the last failure once
/// `policy.attempts` attempts have failed.
pub async fn ensure_database<P>(db: &P, policy: RetryPolicy) -> Result<u32, BootstrapError>
where
    P: DatabaseProbe + ?Sized,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match try_once(db).await {
            Ok(()) => {
                tracing::info!(attempt, "Database ready, migrations applied");
                return Ok(attempt);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Database not ready, retrying in {:?}",
                    policy.backoff
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(last_error) => {
                tracing::error!(attempts, error = %last_error, "Giving up on database");
                return Err(BootstrapError::RetriesExhausted {
                    attempts,
                    last_error,
                });
            }
        }
    }
}

async fn try_once<P>(db: &P) -> Result<(), AttemptError>
where
    P: DatabaseProbe + ?Sized,
{
    db.ping().await?;
    db.apply_migrations().await?;
    Ok(())
}

/// Apply migrations only if the schema has no tables at all.
///
/// # Errors
///
/// Returns `BootstrapError::Inspect` if the table list cannot be read and
/// `BootstrapError::Schema` if migrating fails.
pub async fn initialize_if_empty<P>(db: &P) -> Result<InitOutcome, BootstrapError>
where
    P: DatabaseProbe + ?Sized,
{
    let tables = db.list_tables().await.map_err(BootstrapError::Inspect)?;

    if !tables.is_empty() {
        tracing::info!(tables = ?tables, "Schema already initialized, skipping migrations");
        return Ok(InitOutcome::AlreadyInitialized);
    }

    db.apply_migrations().await?;
    tracing::info!("Empty schema migrated");
    Ok(InitOutcome::Migrated)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::db::ConnectionDescriptor;

    /// Unreachable for the first `failures` pings.
    #[derive(Debug, Default)]
    struct FlakyProbe {
        failures: u32,
        pings: AtomicU32,
        migrations: AtomicU32,
        tables: Mutex<Vec<String>>,
    }

    impl FlakyProbe {
        fn failing(failures: u32) -> Self {
            Self {
                failures,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl DatabaseProbe for FlakyProbe {
        async fn ping(&self) -> Result<(), ConnectivityError> {
            let n = self.pings.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(ConnectivityError::Unreachable(sqlx::Error::PoolTimedOut));
            }
            Ok(())
        }

        async fn apply_migrations(&self) -> Result<(), SchemaError> {
            self.migrations.fetch_add(1, Ordering::SeqCst);
            self.tables.lock().unwrap().push("usermysql".to_string());
            Ok(())
        }

        async fn list_tables(&self) -> Result<Vec<String>, sqlx::Error> {
            Ok(self.tables.lock().unwrap().clone())
        }
    }

    const FAST: RetryPolicy = RetryPolicy {
        attempts: 5,
        backoff: Duration::ZERO,
    };

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let probe = FlakyProbe::failing(3);

        let used = ensure_database(&probe, FAST).await.unwrap();

        assert_eq!(used, 4);
        assert_eq!(probe.pings.load(Ordering::SeqCst), 4);
        assert_eq!(probe.migrations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_is_an_error() {
        let probe = FlakyProbe::failing(u32::MAX);

        let err = ensure_database(&probe, FAST).await.unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::RetriesExhausted {
                attempts: 5,
                last_error: AttemptError::Connectivity(_)
            }
        ));
        assert_eq!(probe.pings.load(Ordering::SeqCst), 5);
        assert_eq!(probe.migrations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_fixed_between_attempts() {
        let probe = FlakyProbe::failing(2);
        let start = tokio::time::Instant::now();

        ensure_database(&probe, RetryPolicy::default()).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_initialize_if_empty_migrates_once() {
        let probe = FlakyProbe::default();

        assert_eq!(initialize_if_empty(&probe).await.unwrap(), InitOutcome::Migrated);
        assert_eq!(
            initialize_if_empty(&probe).await.unwrap(),
            InitOutcome::AlreadyInitialized
        );
        assert_eq!(probe.migrations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sqlite_bootstrap_creates_user_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&ConnectionDescriptor::Sqlite {
            path: dir.path().join("boot.sqlite3"),
        })
        .unwrap();

        assert_eq!(initialize_if_empty(&db).await.unwrap(), InitOutcome::Migrated);
        assert_eq!(ensure_database(&db, FAST).await.unwrap(), 1);
        assert_eq!(db.list_tables().await.unwrap(), vec!["users_sqlite"]);

        db.close().await;
    }
}
