//! SQLite backend: `users_sqlite`.

use async_trait::async_trait;
use roster_core::{UserId, UserName};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use super::schema::SchemaAdmin;
use super::{RepositoryError, UserRow, UserStore};
use crate::models::User;

/// Table holding users on SQLite.
pub const USERS_TABLE: &str = "users_sqlite";

/// Declared tables, created with `IF NOT EXISTS`.
const DECLARED_TABLES: &[&str] = &[r"
    CREATE TABLE IF NOT EXISTS users_sqlite (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name VARCHAR(255) NOT NULL
    )
"];

/// Create every declared table that does not exist yet.
pub(crate) async fn create_declared_tables(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for ddl in DECLARED_TABLES {
        sqlx::query(ddl).execute(&mut *conn).await?;
    }
    Ok(())
}

/// User tables, excluding SQLite's internal `sqlite_*` tables.
pub(crate) async fn list_tables(conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(conn)
    .await
}

/// Repository for users stored in SQLite.
#[derive(Debug, Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn create(&self, name: &UserName) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("INSERT INTO users_sqlite (name) VALUES (?)")
            .bind(name.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(User {
            id: UserId::new(result.last_insert_rowid()),
            name: name.as_str().to_owned(),
        })
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT id, name FROM users_sqlite ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM users_sqlite")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

/// Schema session over one pooled SQLite connection.
#[derive(Debug)]
pub struct SqliteSchemaAdmin {
    conn: PoolConnection<Sqlite>,
}

impl SqliteSchemaAdmin {
    #[must_use]
    pub const fn new(conn: PoolConnection<Sqlite>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SchemaAdmin for SqliteSchemaAdmin {
    async fn list_tables(&mut self) -> Result<Vec<String>, sqlx::Error> {
        list_tables(&mut self.conn).await
    }

    async fn drop_table(&mut self, table: &str) -> Result<(), sqlx::Error> {
        let statement = format!("DROP TABLE IF EXISTS \"{}\"", table.replace('"', "\"\""));
        sqlx::query(&statement).execute(&mut *self.conn).await?;
        Ok(())
    }

    async fn create_declared_tables(&mut self) -> Result<(), sqlx::Error> {
        create_declared_tables(&mut self.conn).await
    }

    async fn finish(&mut self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn memory_pool() -> SqlitePool {
        // One connection so every query sees the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        create_declared_tables(&mut conn).await.unwrap();
        drop(conn);
        pool
    }

    #[tokio::test]
    async fn test_create_and_list_in_insertion_order() {
        let store = SqliteUserStore::new(memory_pool().await);

        let alice = store.create(&UserName::parse("Alice").unwrap()).await.unwrap();
        let bob = store.create(&UserName::parse(" Bob ").unwrap()).await.unwrap();
        assert!(alice.id < bob.id);

        let names: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[tokio::test]
    async fn test_delete_all_reports_count() {
        let store = SqliteUserStore::new(memory_pool().await);
        assert_eq!(store.delete_all().await.unwrap(), 0);

        for name in ["a", "b", "c"] {
            store.create(&UserName::parse(name).unwrap()).await.unwrap();
        }
        assert_eq!(store.delete_all().await.unwrap(), 3);
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_rows_in_place() {
        let pool = memory_pool().await;
        let store = SqliteUserStore::new(pool.clone());
        for name in ["a", "b"] {
            store.create(&UserName::parse(name).unwrap()).await.unwrap();
        }
        sqlx::query(
            "CREATE TRIGGER keep_users BEFORE DELETE ON users_sqlite \
             BEGIN SELECT RAISE(ABORT, 'locked'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let err = store.delete_all().await.unwrap_err();

        assert!(matches!(err, RepositoryError::Database(_)), "{err:?}");
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_delete() {
        let store = SqliteUserStore::new(memory_pool().await);

        let first = store.create(&UserName::parse("first").unwrap()).await.unwrap();
        store.delete_all().await.unwrap();
        let second = store.create(&UserName::parse("second").unwrap()).await.unwrap();

        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_create_declared_tables_is_idempotent() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        create_declared_tables(&mut conn).await.unwrap();
        create_declared_tables(&mut conn).await.unwrap();

        assert_eq!(list_tables(&mut conn).await.unwrap(), vec![USERS_TABLE]);
    }
}
