//! Schema synchronizer.
//!
//! Runs once at startup, after the bootstrap sequencer has confirmed the
//! database is reachable. The strategy depends only on the backend and the
//! deployment mode:
//!
//! | backend | deployment | strategy |
//! |---|---|---|
//! | sqlite | any | [`SyncStrategy::CreateIfMissing`] |
//! | mysql | docker | [`SyncStrategy::DestructiveRecreate`] |
//! | mysql | lolipop-* | [`SyncStrategy::ApplyMigrations`] |

use std::fmt;

use async_trait::async_trait;
use roster_core::{DatabaseBackend, DeploymentMode};
use thiserror::Error;
use tracing::instrument;

use super::Database;

/// Migration bookkeeping table. Never dropped.
pub const MIGRATIONS_TABLE: &str = "_sqlx_migrations";

/// Errors from schema synchronization.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Tables were dropped but could not be created again.
    #[error("failed to recreate tables after dropping {dropped:?}: {source}")]
    Recreate {
        dropped: Vec<String>,
        #[source]
        source: sqlx::Error,
    },
}

/// How the schema is brought in line with the declared tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// `CREATE TABLE IF NOT EXISTS` for each declared table.
    CreateIfMissing,
    /// Drop every table except [`MIGRATIONS_TABLE`], then create.
    DestructiveRecreate,
    /// Run the embedded migrator.
    ApplyMigrations,
}

impl SyncStrategy {
    #[must_use]
    pub const fn select(backend: DatabaseBackend, deployment: DeploymentMode) -> Self {
        match (backend, deployment) {
            (DatabaseBackend::Sqlite, _) => Self::CreateIfMissing,
            (DatabaseBackend::MySql, DeploymentMode::Docker) => Self::DestructiveRecreate,
            (DatabaseBackend::MySql, DeploymentMode::LolipopTest | DeploymentMode::LolipopProd) => {
                Self::ApplyMigrations
            }
        }
    }
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreateIfMissing => "create-if-missing",
            Self::DestructiveRecreate => "destructive-recreate",
            Self::ApplyMigrations => "apply-migrations",
        })
    }
}

/// What a synchronization run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub strategy: SyncStrategy,
    /// Tables dropped and recreated (destructive strategy only).
    pub dropped: Vec<String>,
    /// Tables whose drop failed and were left in place.
    pub skipped: Vec<String>,
}

impl SyncReport {
    const fn empty(strategy: SyncStrategy) -> Self {
        Self {
            strategy,
            dropped: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Table-level operations on one dedicated connection.
///
/// Implemented per backend; tests substitute a recording fake.
#[async_trait]
pub trait SchemaAdmin: Send {
    /// Every table in the schema, [`MIGRATIONS_TABLE`] included.
    async fn list_tables(&mut self) -> Result<Vec<String>, sqlx::Error>;

    async fn drop_table(&mut self, table: &str) -> Result<(), sqlx::Error>;

    /// Create every declared table (`IF NOT EXISTS`).
    async fn create_declared_tables(&mut self) -> Result<(), sqlx::Error>;

    /// Restore session state changed for the duration of the work.
    async fn finish(&mut self) -> Result<(), sqlx::Error>;
}

/// Bring the schema in line with the declared tables.
///
/// # Errors
///
/// Any driver or migration error is returned; callers treat it as fatal.
#[instrument(skip(db), fields(backend = %db.backend()))]
pub async fn synchronize(
    db: &Database,
    deployment: DeploymentMode,
) -> Result<SyncReport, SchemaError> {
    let strategy = SyncStrategy::select(db.backend(), deployment);
    tracing::info!(%strategy, "Synchronizing schema");

    let report = match strategy {
        SyncStrategy::CreateIfMissing => {
            let mut admin = db.schema_admin().await?;
            admin.create_declared_tables().await?;
            admin.finish().await?;
            SyncReport::empty(strategy)
        }
        SyncStrategy::DestructiveRecreate => {
            let mut admin = db.schema_admin().await?;
            recreate_schema(admin.as_mut()).await?
        }
        SyncStrategy::ApplyMigrations => {
            db.apply_migrations().await?;
            SyncReport::empty(strategy)
        }
    };

    tracing::info!(
        %strategy,
        dropped = report.dropped.len(),
        skipped = report.skipped.len(),
        "Schema synchronized"
    );
    Ok(report)
}

/// Drop every non-migration table, then create the declared tables.
///
/// A table that fails to drop is logged and skipped. Failing to create
/// afterwards is fatal since the schema may now be missing tables; session
/// settings are still restored before the error is returned.
///
/// # Errors
///
/// Returns `SchemaError::Database` if the table list cannot be read and
/// `SchemaError::Recreate` if creation fails.
pub async fn recreate_schema(admin: &mut dyn SchemaAdmin) -> Result<SyncReport, SchemaError> {
    let mut report = SyncReport::empty(SyncStrategy::DestructiveRecreate);

    for table in admin.list_tables().await? {
        if table == MIGRATIONS_TABLE {
            continue;
        }
        match admin.drop_table(&table).await {
            Ok(()) => {
                tracing::info!(table = %table, "Dropped table");
                report.dropped.push(table);
            }
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "Failed to drop table, skipping");
                report.skipped.push(table);
            }
        }
    }

    if let Err(source) = admin.create_declared_tables().await {
        tracing::error!(error = %source, dropped = ?report.dropped, "Failed to recreate tables");
        if let Err(e) = admin.finish().await {
            tracing::warn!(error = %e, "Failed to restore session settings");
        }
        return Err(SchemaError::Recreate {
            dropped: report.dropped,
            source,
        });
    }

    admin.finish().await?;
    Ok(report)
}
