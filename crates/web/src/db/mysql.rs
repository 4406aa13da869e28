//! MySQL backend: `usermysql`.

use async_trait::async_trait;
use roster_core::{UserId, UserName};
use sqlx::migrate::Migrator;
use sqlx::pool::PoolConnection;
use sqlx::{MySql, MySqlConnection, MySqlPool};

use super::schema::SchemaAdmin;
use super::{RepositoryError, UserRow, UserStore};
use crate::models::User;

/// Embedded migrations for the MySQL schema.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations/mysql");

/// Table holding users on MySQL.
pub const USERS_TABLE: &str = "usermysql";

/// Declared tables, matching the latest migration.
const DECLARED_TABLES: &[&str] = &[r"
    CREATE TABLE IF NOT EXISTS usermysql (
        id BIGINT NOT NULL AUTO_INCREMENT,
        name VARCHAR(255) NOT NULL,
        PRIMARY KEY (id)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"];

/// Tables in the current schema, bookkeeping included.
pub(crate) async fn list_tables(conn: &mut MySqlConnection) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT CAST(table_name AS CHAR) FROM information_schema.tables \
         WHERE table_schema = DATABASE() ORDER BY table_name",
    )
    .fetch_all(conn)
    .await
}

/// Repository for users stored in MySQL.
#[derive(Debug, Clone)]
pub struct MySqlUserStore {
    pool: MySqlPool,
}

impl MySqlUserStore {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for MySqlUserStore {
    async fn create(&self, name: &UserName) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("INSERT INTO usermysql (name) VALUES (?)")
            .bind(name.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let id = i64::try_from(result.last_insert_id()).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "insert id {} out of range",
                result.last_insert_id()
            ))
        })?;

        Ok(User {
            id: UserId::new(id),
            name: name.as_str().to_owned(),
        })
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT id, name FROM usermysql ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM usermysql")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

/// Schema session over one dedicated MySQL connection.
///
/// Foreign key checks are disabled for the lifetime of the session so tables
/// can be dropped in any order; [`SchemaAdmin::finish`] turns them back on.
#[derive(Debug)]
pub struct MySqlSchemaAdmin {
    conn: PoolConnection<MySql>,
}

impl MySqlSchemaAdmin {
    /// Start an administrative session on `conn`.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` if the session variables cannot be set.
    pub async fn begin(mut conn: PoolConnection<MySql>) -> Result<Self, sqlx::Error> {
        sqlx::query("SET FOREIGN_KEY_CHECKS = 0")
            .execute(&mut *conn)
            .await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SchemaAdmin for MySqlSchemaAdmin {
    async fn list_tables(&mut self) -> Result<Vec<String>, sqlx::Error> {
        list_tables(&mut self.conn).await
    }

    async fn drop_table(&mut self, table: &str) -> Result<(), sqlx::Error> {
        let statement = format!("DROP TABLE IF EXISTS `{}`", table.replace('`', "``"));
        sqlx::query(&statement).execute(&mut *self.conn).await?;
        Ok(())
    }

    async fn create_declared_tables(&mut self) -> Result<(), sqlx::Error> {
        for ddl in DECLARED_TABLES {
            sqlx::query(ddl).execute(&mut *self.conn).await?;
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), sqlx::Error> {
        sqlx::query("SET FOREIGN_KEY_CHECKS = 1")
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}
