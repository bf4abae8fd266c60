//! Catalog record repository
//!
//! One row per (series, season, episode) triple fetched from the remote
//! catalog, keyed by the composite record id `seriesID-seasonID-episodeID`.
//! Inserts are idempotent; the only in-place mutation is the search-string
//! repair performed during lookup.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::diagnostics::{DiagnosticCode, DiagnosticEvent, DiagnosticSink};
use crate::services::catalog::FetchedSeries;

/// Compose the unique record id for one (series, season, episode) triple.
pub fn compose_record_id(series_id: i64, season_id: i64, episode_id: i64) -> String {
    format!("{}-{}-{}", series_id, season_id, episode_id)
}

/// Catalog record from database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogRecord {
    pub record_id: String,
    pub episode_name: String,
    pub episode_remote_id: i64,
    pub episode_number: i64,
    pub episode_overview: Option<String>,
    pub episode_still_path: Option<String>,
    pub season_number: i64,
    pub season_remote_id: i64,
    pub series_name: String,
    pub series_original_name: Option<String>,
    pub series_overview: Option<String>,
    pub series_poster_path: Option<String>,
    pub series_remote_id: i64,
    pub season_count: i64,
    pub episode_count: i64,
    pub search_string: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository for catalog record operations
pub struct CatalogRepository {
    pool: SqlitePool,
    sink: Arc<dyn DiagnosticSink>,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { pool, sink }
    }

    /// Look up records for a library series name.
    ///
    /// Tries the search string first, then falls back to the stored series
    /// name. A fallback hit repairs the search string of every matched
    /// record, so the next lookup for the same name hits directly.
    pub async fn lookup(&self, search_string: &str) -> Result<Vec<CatalogRecord>> {
        let direct = self.find_by_search_string(search_string).await?;
        if !direct.is_empty() {
            return Ok(direct);
        }

        let fallback = self.find_by_series_name(search_string).await?;
        if fallback.is_empty() {
            return Ok(Vec::new());
        }

        self.repair_search_string(search_string).await?;
        self.find_by_search_string(search_string).await
    }

    /// Find records by the search string they were stored under
    pub async fn find_by_search_string(&self, search_string: &str) -> Result<Vec<CatalogRecord>> {
        let records = sqlx::query_as::<_, CatalogRecord>(
            r#"
            SELECT record_id, episode_name, episode_remote_id, episode_number,
                   episode_overview, episode_still_path, season_number,
                   season_remote_id, series_name, series_original_name,
                   series_overview, series_poster_path, series_remote_id,
                   season_count, episode_count, search_string,
                   created_at, updated_at
            FROM catalog_records
            WHERE search_string = ?
            ORDER BY season_number, episode_number
            "#,
        )
        .bind(search_string)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Find records by the series display name reported by the catalog
    pub async fn find_by_series_name(&self, series_name: &str) -> Result<Vec<CatalogRecord>> {
        let records = sqlx::query_as::<_, CatalogRecord>(
            r#"
            SELECT record_id, episode_name, episode_remote_id, episode_number,
                   episode_overview, episode_still_path, season_number,
                   season_remote_id, series_name, series_original_name,
                   series_overview, series_poster_path, series_remote_id,
                   season_count, episode_count, search_string,
                   created_at, updated_at
            FROM catalog_records
            WHERE series_name = ?
            ORDER BY season_number, episode_number
            "#,
        )
        .bind(series_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Check whether a record id is already stored
    pub async fn exists(&self, record_id: &str) -> Result<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT record_id FROM catalog_records WHERE record_id = ?")
                .bind(record_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    /// Store one record per episode of the fetched series.
    ///
    /// Rows whose record id is already present are left untouched. Returns
    /// the number of rows actually inserted.
    pub async fn insert_all(&self, series: &FetchedSeries, search_string: &str) -> Result<u64> {
        let now = Utc::now();
        let mut inserted = 0u64;
        let mut total = 0u64;

        for season in &series.seasons {
            for episode in &season.episodes {
                total += 1;
                let record_id =
                    compose_record_id(series.remote_id, season.remote_id, episode.remote_id);

                let result = sqlx::query(
                    r#"
                    INSERT INTO catalog_records (
                        record_id, episode_name, episode_remote_id, episode_number,
                        episode_overview, episode_still_path, season_number,
                        season_remote_id, series_name, series_original_name,
                        series_overview, series_poster_path, series_remote_id,
                        season_count, episode_count, search_string,
                        created_at, updated_at
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(record_id) DO NOTHING
                    "#,
                )
                .bind(&record_id)
                .bind(&episode.name)
                .bind(episode.remote_id)
                .bind(i64::from(episode.number))
                .bind(&episode.overview)
                .bind(&episode.still_path)
                .bind(i64::from(season.number))
                .bind(season.remote_id)
                .bind(&series.name)
                .bind(&series.original_name)
                .bind(&series.overview)
                .bind(&series.poster_path)
                .bind(series.remote_id)
                .bind(i64::from(series.season_count))
                .bind(i64::from(series.episode_count))
                .bind(search_string)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    self.sink.emit(DiagnosticEvent::info(
                        DiagnosticCode::DuplicateRecord,
                        format!("Record {} already stored", record_id),
                    ));
                } else {
                    inserted += 1;
                }
            }
        }

        info!(
            series = %series.name,
            inserted,
            total,
            "Stored catalog records"
        );

        Ok(inserted)
    }

    /// Point every record matched by series name at the given search string.
    async fn repair_search_string(&self, search_string: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE catalog_records SET search_string = ?, updated_at = ? WHERE series_name = ?",
        )
        .bind(search_string)
        .bind(Utc::now())
        .bind(search_string)
        .execute(&self.pool)
        .await?;

        self.sink.emit(DiagnosticEvent::warning(
            DiagnosticCode::SearchStringRewritten,
            format!(
                "Found '{}' by series name only, rewrote the search string of {} records",
                search_string,
                result.rows_affected()
            ),
        ));

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::diagnostics::MemorySink;
    use crate::services::catalog::{FetchedEpisode, FetchedSeason};

    fn sample_series() -> FetchedSeries {
        FetchedSeries {
            remote_id: 100,
            name: "Remote Title".to_string(),
            original_name: Some("Remote Title".to_string()),
            overview: Some("A show".to_string()),
            poster_path: None,
            season_count: 1,
            episode_count: 2,
            seasons: vec![FetchedSeason {
                remote_id: 200,
                number: 1,
                episodes: vec![
                    FetchedEpisode {
                        remote_id: 301,
                        name: "First Light".to_string(),
                        number: 1,
                        overview: None,
                        still_path: None,
                    },
                    FetchedEpisode {
                        remote_id: 302,
                        name: "Second Dawn".to_string(),
                        number: 2,
                        overview: None,
                        still_path: None,
                    },
                ],
            }],
        }
    }

    async fn memory_repo() -> (CatalogRepository, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let db = Database::connect_in_memory(sink.clone()).await.unwrap();
        (db.catalog(), sink)
    }

    #[test]
    fn test_compose_record_id() {
        assert_eq!(compose_record_id(100, 200, 301), "100-200-301");
    }

    #[tokio::test]
    async fn test_insert_all_stores_one_row_per_episode() {
        let (repo, _sink) = memory_repo().await;

        let inserted = repo.insert_all(&sample_series(), "remote title").await.unwrap();

        assert_eq!(inserted, 2);
        assert!(repo.exists("100-200-301").await.unwrap());
        assert!(repo.exists("100-200-302").await.unwrap());

        let records = repo.find_by_search_string("remote title").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].episode_name, "First Light");
        assert_eq!(records[0].series_name, "Remote Title");
        assert_eq!(records[0].season_number, 1);
        assert_eq!(records[1].episode_number, 2);
    }

    #[tokio::test]
    async fn test_insert_all_is_idempotent() {
        let (repo, sink) = memory_repo().await;
        let series = sample_series();

        let first = repo.insert_all(&series, "remote title").await.unwrap();
        let second = repo.insert_all(&series, "remote title").await.unwrap();

        assert_eq!(first, 2);
        assert_eq!(second, 0);
        assert_eq!(sink.count(DiagnosticCode::DuplicateRecord), 2);

        let records = repo.find_by_search_string("remote title").await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_lookup_prefers_search_string() {
        let (repo, sink) = memory_repo().await;
        repo.insert_all(&sample_series(), "remote title").await.unwrap();

        let records = repo.lookup("remote title").await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(sink.count(DiagnosticCode::SearchStringRewritten), 0);
    }

    #[tokio::test]
    async fn test_lookup_falls_back_to_series_name_and_repairs() {
        let (repo, sink) = memory_repo().await;
        // Stored under the query that found them, not the display name.
        repo.insert_all(&sample_series(), "remote").await.unwrap();

        let records = repo.lookup("Remote Title").await.unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.search_string == "Remote Title"));
        assert_eq!(sink.count(DiagnosticCode::SearchStringRewritten), 1);

        // The repair sticks: the old search string no longer matches.
        assert!(repo.find_by_search_string("remote").await.unwrap().is_empty());
        let again = repo.lookup("Remote Title").await.unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(sink.count(DiagnosticCode::SearchStringRewritten), 1);
    }

    #[tokio::test]
    async fn test_lookup_misses_cleanly() {
        let (repo, sink) = memory_repo().await;

        let records = repo.lookup("Nothing Here").await.unwrap();

        assert!(records.is_empty());
        assert_eq!(sink.count(DiagnosticCode::SearchStringRewritten), 0);
    }

    #[tokio::test]
    async fn test_exists_for_unknown_record() {
        let (repo, _sink) = memory_repo().await;
        assert!(!repo.exists("1-2-3").await.unwrap());
    }
}
