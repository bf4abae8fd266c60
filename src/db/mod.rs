//! Database connection and the catalog record store

pub mod catalog;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

pub use catalog::{CatalogRecord, CatalogRepository, compose_record_id};

use crate::diagnostics::DiagnosticSink;

const MAX_CONNECTIONS: u32 = 5;

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    sink: Arc<dyn DiagnosticSink>,
}

impl Database {
    /// Open the database at the given URL, creating the file and the
    /// schema when missing.
    pub async fn connect(url: &str, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        Self::new(Self::tune(options), MAX_CONNECTIONS, sink).await
    }

    /// In-memory database, used by tests.
    ///
    /// Limited to a single connection: parallel connections to `:memory:`
    /// each see their own empty database. Not gated behind `#[cfg(test)]`
    /// so integration tests can use it too.
    pub async fn connect_in_memory(sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(":memory:");
        Self::new(Self::tune(options), 1, sink).await
    }

    async fn new(
        options: SqliteConnectOptions,
        max_connections: u32,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let db = Self { pool, sink };
        db.create_tables().await?;
        Ok(db)
    }

    /// Connection options shared between file and in-memory databases.
    fn tune(options: SqliteConnectOptions) -> SqliteConnectOptions {
        options
            // WAL keeps concurrent readers cheap while one writer inserts
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            // Inserts racing a concurrent run wait instead of SQLITE_BUSY
            .busy_timeout(Duration::from_millis(1500))
    }

    async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS catalog_records (
                record_id TEXT PRIMARY KEY,
                episode_name TEXT NOT NULL,
                episode_remote_id INTEGER NOT NULL,
                episode_number INTEGER NOT NULL,
                episode_overview TEXT,
                episode_still_path TEXT,
                season_number INTEGER NOT NULL,
                season_remote_id INTEGER NOT NULL,
                series_name TEXT NOT NULL,
                series_original_name TEXT,
                series_overview TEXT,
                series_poster_path TEXT,
                series_remote_id INTEGER NOT NULL,
                season_count INTEGER NOT NULL,
                episode_count INTEGER NOT NULL,
                search_string TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_catalog_records_search_string
             ON catalog_records (search_string)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_catalog_records_series_name
             ON catalog_records (series_name)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get a catalog record repository
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone(), self.sink.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;

    #[tokio::test]
    async fn test_connect_in_memory_creates_schema() {
        let db = Database::connect_in_memory(Arc::new(MemorySink::new()))
            .await
            .unwrap();
        let row: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
                .bind("catalog_records")
                .fetch_optional(db.pool())
                .await
                .unwrap();
        assert!(row.is_some());
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() {
        let db = Database::connect_in_memory(Arc::new(MemorySink::new()))
            .await
            .unwrap();
        db.create_tables().await.unwrap();
    }
}
