//! Database access for the single `User` table.
//!
//! # Backends
//!
//! Exactly one backend is active per process, chosen by `ENV_DB`:
//!
//! - `sqlite` - `users_sqlite` in `<DATA_DIR>/app.sqlite3`
//! - `mysql` - `usermysql` in the schema named by the per-deployment URI
//!
//! Both expose the same [`UserStore`] capability so handlers never know
//! which one they talk to.
//!
//! # Migrations
//!
//! MySQL migrations live in `crates/web/migrations/mysql/` and are applied by
//! the bootstrap sequencer or explicitly via:
//! ```bash
//! cargo run -p roster-cli -- ensure-db
//! ```
//! SQLite tables are created on startup if missing.

pub mod mysql;
pub mod resolver;
pub mod schema;
pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use roster_core::{DatabaseBackend, UserId, UserName};
use secrecy::ExposeSecret;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

use crate::models::User;

pub use resolver::{ConnectionDescriptor, resolve};
pub use schema::{SchemaAdmin, SchemaError, SyncReport, SyncStrategy, synchronize};

/// Timeout for acquiring a pooled connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Errors reaching the database.
#[derive(Debug, Error)]
pub enum ConnectivityError {
    /// The URI variable for the selected deployment is not set.
    #[error("{var} is not set")]
    MissingUri { var: &'static str },

    /// The URI could not be parsed into connection options.
    #[error("invalid {backend} connection string: {source}")]
    InvalidUri {
        backend: DatabaseBackend,
        #[source]
        source: sqlx::Error,
    },

    /// The server did not answer.
    #[error("database unreachable: {0}")]
    Unreachable(#[source] sqlx::Error),
}

/// The capability the router needs from storage.
#[async_trait]
pub trait UserStore: Send + Sync + std::fmt::Debug {
    /// Insert one user and commit.
    async fn create(&self, name: &UserName) -> Result<User, RepositoryError>;

    /// All users ordered by id.
    async fn list_all(&self) -> Result<Vec<User>, RepositoryError>;

    /// Delete every user in one statement, returning the number removed.
    /// The transaction is rolled back on failure.
    async fn delete_all(&self) -> Result<u64, RepositoryError>;
}

/// Row shape shared by both user tables.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::new(row.id),
            name: row.name,
        }
    }
}

/// An open (lazily connecting) pool for the selected backend.
#[derive(Debug, Clone)]
pub enum Database {
    Sqlite(SqlitePool),
    MySql(MySqlPool),
}

impl Database {
    /// Build a pool for `descriptor` without touching the network.
    ///
    /// Connections are established on first use, so an unreachable server
    /// surfaces in [`Database::ping`] where the bootstrap sequencer can retry.
    ///
    /// # Errors
    ///
    /// Returns `ConnectivityError::MissingUri` when the selected MySQL URI is
    /// unset and `ConnectivityError::InvalidUri` when it cannot be parsed.
    pub fn open(descriptor: &ConnectionDescriptor) -> Result<Self, ConnectivityError> {
        match descriptor {
            ConnectionDescriptor::Sqlite { path } => {
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .busy_timeout(Duration::from_secs(5));

                let pool = SqlitePoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(ACQUIRE_TIMEOUT)
                    .connect_lazy_with(options);

                tracing::info!(path = %path.display(), "SQLite pool created");
                Ok(Self::Sqlite(pool))
            }
            ConnectionDescriptor::MySql { uri, var, .. } => {
                let uri = uri.as_ref().ok_or(ConnectivityError::MissingUri { var: *var })?;
                let options: MySqlConnectOptions =
                    uri.expose_secret()
                        .parse()
                        .map_err(|source| ConnectivityError::InvalidUri {
                            backend: DatabaseBackend::MySql,
                            source,
                        })?;

                let pool = MySqlPoolOptions::new()
                    .max_connections(10)
                    .acquire_timeout(ACQUIRE_TIMEOUT)
                    .connect_lazy_with(options.charset("utf8mb4"));

                tracing::info!(uri = %descriptor.redacted(), "MySQL pool created");
                Ok(Self::MySql(pool))
            }
        }
    }

    /// Which backend this pool talks to.
    #[must_use]
    pub const fn backend(&self) -> DatabaseBackend {
        match self {
            Self::Sqlite(_) => DatabaseBackend::Sqlite,
            Self::MySql(_) => DatabaseBackend::MySql,
        }
    }

    /// Round-trip a trivial query.
    ///
    /// # Errors
    ///
    /// Returns `ConnectivityError::Unreachable` if no connection can be made.
    pub async fn ping(&self) -> Result<(), ConnectivityError> {
        let result = match self {
            Self::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            Self::MySql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        };
        result.map_err(ConnectivityError::Unreachable)
    }

    /// Names of the tables currently present, bookkeeping included.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` if the catalog query fails.
    pub async fn list_tables(&self) -> Result<Vec<String>, sqlx::Error> {
        match self {
            Self::Sqlite(pool) => {
                let mut conn = pool.acquire().await?;
                sqlite::list_tables(&mut conn).await
            }
            Self::MySql(pool) => {
                let mut conn = pool.acquire().await?;
                mysql::list_tables(&mut conn).await
            }
        }
    }

    /// Apply pending migrations. Idempotent.
    ///
    /// SQLite has no migration history; its declared tables are created if
    /// missing. MySQL runs the embedded migrator.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if the DDL or a migration fails.
    pub async fn apply_migrations(&self) -> Result<(), SchemaError> {
        match self {
            Self::Sqlite(pool) => {
                let mut conn = pool.acquire().await?;
                sqlite::create_declared_tables(&mut conn).await?;
            }
            Self::MySql(pool) => {
                mysql::MIGRATOR.run(pool).await?;
            }
        }
        Ok(())
    }

    /// Open an administrative session for destructive schema work.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` if no connection can be acquired.
    pub async fn schema_admin(&self) -> Result<Box<dyn SchemaAdmin>, sqlx::Error> {
        let admin: Box<dyn SchemaAdmin> = match self {
            Self::Sqlite(pool) => Box::new(sqlite::SqliteSchemaAdmin::new(pool.acquire().await?)),
            Self::MySql(pool) => {
                Box::new(mysql::MySqlSchemaAdmin::begin(pool.acquire().await?).await?)
            }
        };
        Ok(admin)
    }

    /// The user repository bound to this pool.
    #[must_use]
    pub fn user_store(&self) -> Arc<dyn UserStore> {
        match self {
            Self::Sqlite(pool) => Arc::new(sqlite::SqliteUserStore::new(pool.clone())),
            Self::MySql(pool) => Arc::new(mysql::MySqlUserStore::new(pool.clone())),
        }
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::MySql(pool) => pool.close().await,
        }
        tracing::info!(backend = %self.backend(), "Database pool closed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use roster_core::DeploymentMode;

    use super::*;

    #[test]
    fn test_open_mysql_without_uri_fails_at_connect_time() {
        let descriptor = ConnectionDescriptor::MySql {
            deployment: DeploymentMode::LolipopProd,
            var: "DATABASE_URI_LOLIPOP_PROD",
            uri: None,
        };

        let err = Database::open(&descriptor).unwrap_err();
        assert!(matches!(
            err,
            ConnectivityError::MissingUri { var: "DATABASE_URI_LOLIPOP_PROD" }
        ));
    }

    #[test]
    fn test_open_mysql_rejects_malformed_uri() {
        let descriptor = ConnectionDescriptor::MySql {
            deployment: DeploymentMode::Docker,
            var: "DATABASE_URI_DOCKER",
            uri: Some("::not-a-uri::".into()),
        };

        assert!(matches!(
            Database::open(&descriptor),
            Err(ConnectivityError::InvalidUri { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_sqlite_reports_backend_and_pings() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&ConnectionDescriptor::Sqlite {
            path: PathBuf::from(dir.path()).join("ping.sqlite3"),
        })
        .unwrap();

        assert_eq!(db.backend(), DatabaseBackend::Sqlite);
        db.ping().await.unwrap();
        db.close().await;
    }
}
