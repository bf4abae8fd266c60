//! Remote catalog client for series metadata
//!
//! Resolves a normalized series name through the catalog's three-step
//! protocol: search by name, fetch series detail by id, then fetch every
//! season's episode listing. Each step depends on the previous one; season
//! listing failures degrade to partial results instead of failing the fetch.
//!
//! Base URL: https://api.themoviedb.org/3

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::rate_limiter::{RateLimitedClient, RetryConfig, retry_async};
use crate::diagnostics::{DiagnosticCode, DiagnosticEvent, DiagnosticSink};

/// Ways a series lookup can dead-end. The reconciliation engine matches on
/// these to decide how a series failed; transport and decode problems end
/// up in `Other` after the retry budget is spent.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no search results for '{query}'")]
    NoSearchResults { query: String },
    #[error("series detail for remote id {series_id} lacks season or episode counts")]
    DetailFetchFailure { series_id: i64 },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Source of canonical series metadata.
///
/// The engine talks to the catalog only through this seam, so tests can
/// resolve series from canned data without network access.
pub trait CatalogProvider: Send + Sync {
    fn fetch_series(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<FetchedSeries, CatalogError>> + Send;
}

/// Search response from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub page: i32,
    pub results: Vec<SeriesSearchResult>,
    pub total_pages: i32,
    pub total_results: i32,
}

/// One search hit. Everything is optional on the wire; the client insists
/// on id and name before going further.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSearchResult {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
}

/// Series detail response, reduced to the counts the pipeline needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesDetailResponse {
    pub number_of_seasons: Option<i32>,
    pub number_of_episodes: Option<i32>,
}

/// Per-season episode listing response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonListing {
    pub id: Option<i64>,
    pub season_number: Option<i32>,
    #[serde(default)]
    pub episodes: Vec<EpisodeListing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeListing {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub episode_number: Option<i32>,
    pub overview: Option<String>,
    pub still_path: Option<String>,
}

/// Fully assembled series metadata, best effort: carries whatever the
/// per-season loop managed to fetch even when count validation warned.
#[derive(Debug, Clone)]
pub struct FetchedSeries {
    pub remote_id: i64,
    pub name: String,
    pub original_name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    /// Season count the detail endpoint declared, not what was fetched.
    pub season_count: i32,
    /// Episode count the detail endpoint declared, not what was fetched.
    pub episode_count: i32,
    pub seasons: Vec<FetchedSeason>,
}

#[derive(Debug, Clone)]
pub struct FetchedSeason {
    pub remote_id: i64,
    pub number: i32,
    pub episodes: Vec<FetchedEpisode>,
}

#[derive(Debug, Clone)]
pub struct FetchedEpisode {
    pub remote_id: i64,
    pub name: String,
    pub number: i32,
    pub overview: Option<String>,
    pub still_path: Option<String>,
}

impl FetchedSeries {
    /// Number of episodes actually fetched across all seasons.
    pub fn fetched_episode_total(&self) -> usize {
        self.seasons.iter().map(|s| s.episodes.len()).sum()
    }
}

/// Identity extracted from the first search hit, ids and name validated.
struct SeriesIdentity {
    remote_id: i64,
    name: String,
    original_name: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
}

/// Catalog API client with rate limiting and retry logic
pub struct CatalogClient {
    client: Arc<RateLimitedClient>,
    base_url: String,
    api_key: String,
    retry_config: RetryConfig,
    sink: Arc<dyn DiagnosticSink>,
}

impl CatalogClient {
    pub fn new(base_url: String, api_key: String, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            client: Arc::new(RateLimitedClient::for_catalog()),
            base_url,
            api_key,
            retry_config: RetryConfig {
                max_attempts: 3,
                first_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(10),
            },
            sink,
        }
    }

    /// Check if the client has an API key configured
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Step one: search by name and validate the first result.
    ///
    /// The first result is taken as-is; there is no disambiguation between
    /// multiple series sharing a name.
    async fn search_first(&self, name: &str) -> Result<SeriesIdentity, CatalogError> {
        let url = format!("{}/search/tv", self.base_url);
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let query = name.to_string();
        let retry_config = self.retry_config.clone();

        let response = retry_async(
            || {
                let url = url.clone();
                let client = client.clone();
                let key = api_key.clone();
                let q = query.clone();
                async move {
                    let response = client
                        .get_with_query(&url, &[("api_key", key), ("query", q)])
                        .await?;

                    if response.status().as_u16() == 429 {
                        warn!("Catalog rate limit hit, will retry");
                        anyhow::bail!("Rate limited (429)");
                    }

                    if response.status().as_u16() == 401 {
                        anyhow::bail!("Catalog API key is invalid");
                    }

                    if !response.status().is_success() {
                        anyhow::bail!("Catalog search failed with status: {}", response.status());
                    }

                    response
                        .json::<SearchResponse>()
                        .await
                        .context("Failed to parse catalog search results")
                }
            },
            &retry_config,
            "catalog_search",
        )
        .await?;

        let Some(first) = response.results.into_iter().next() else {
            return Err(CatalogError::NoSearchResults {
                query: name.to_string(),
            });
        };

        match (first.id, first.name) {
            (Some(remote_id), Some(display_name)) => Ok(SeriesIdentity {
                remote_id,
                name: display_name,
                original_name: first.original_name,
                overview: first.overview,
                poster_path: first.poster_path,
            }),
            _ => Err(CatalogError::NoSearchResults {
                query: name.to_string(),
            }),
        }
    }

    /// Step two: fetch the declared season and episode counts by id.
    async fn series_detail(&self, series_id: i64) -> Result<(i32, i32), CatalogError> {
        let url = format!("{}/tv/{}", self.base_url, series_id);
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let retry_config = self.retry_config.clone();

        let detail = retry_async(
            || {
                let url = url.clone();
                let client = client.clone();
                let key = api_key.clone();
                async move {
                    let response = client.get_with_query(&url, &[("api_key", &key)]).await?;

                    if response.status().as_u16() == 429 {
                        warn!("Catalog rate limit hit, will retry");
                        anyhow::bail!("Rate limited (429)");
                    }

                    if response.status().as_u16() == 404 {
                        anyhow::bail!("Series {} not found in catalog", series_id);
                    }

                    if !response.status().is_success() {
                        anyhow::bail!("Catalog detail failed with status: {}", response.status());
                    }

                    response
                        .json::<SeriesDetailResponse>()
                        .await
                        .context("Failed to parse catalog series detail")
                }
            },
            &retry_config,
            "catalog_detail",
        )
        .await?;

        match (detail.number_of_seasons, detail.number_of_episodes) {
            (Some(seasons), Some(episodes)) => Ok((seasons, episodes)),
            _ => Err(CatalogError::DetailFetchFailure { series_id }),
        }
    }

    /// Step three, one call: fetch a single season's episode listing.
    async fn season_listing(&self, series_id: i64, number: i32) -> anyhow::Result<SeasonListing> {
        let url = format!("{}/tv/{}/season/{}", self.base_url, series_id, number);
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let retry_config = self.retry_config.clone();

        retry_async(
            || {
                let url = url.clone();
                let client = client.clone();
                let key = api_key.clone();
                async move {
                    let response = client.get_with_query(&url, &[("api_key", &key)]).await?;

                    if response.status().as_u16() == 429 {
                        warn!("Catalog rate limit hit, will retry");
                        anyhow::bail!("Rate limited (429)");
                    }

                    if !response.status().is_success() {
                        anyhow::bail!(
                            "Catalog season listing failed with status: {}",
                            response.status()
                        );
                    }

                    response
                        .json::<SeasonListing>()
                        .await
                        .context("Failed to parse catalog season listing")
                }
            },
            &retry_config,
            "catalog_season",
        )
        .await
    }
}

impl CatalogProvider for CatalogClient {
    async fn fetch_series(&self, name: &str) -> Result<FetchedSeries, CatalogError> {
        if !self.has_api_key() {
            return Err(CatalogError::Other(anyhow::anyhow!(
                "Catalog API key not configured"
            )));
        }

        info!(series = %name, "Fetching series from remote catalog");

        let identity = self.search_first(name).await?;
        let (season_count, episode_count) = self.series_detail(identity.remote_id).await?;

        let mut seasons: Vec<FetchedSeason> = Vec::new();
        for number in 1..=season_count {
            let listing = match self.season_listing(identity.remote_id, number).await {
                Ok(listing) => listing,
                Err(e) => {
                    self.sink.emit(DiagnosticEvent::error(
                        DiagnosticCode::SeasonFetchFailed,
                        format!("Season {} of '{}': {:#}", number, identity.name, e),
                    ));
                    continue;
                }
            };

            if listing.episodes.is_empty() {
                self.sink.emit(DiagnosticEvent::warning(
                    DiagnosticCode::SeasonFetchFailed,
                    format!("Season {} of '{}' returned no episodes", number, identity.name),
                ));
                continue;
            }

            let Some(season_remote_id) = listing.id else {
                self.sink.emit(DiagnosticEvent::warning(
                    DiagnosticCode::SeasonFetchFailed,
                    format!("Season {} of '{}' carries no remote id", number, identity.name),
                ));
                continue;
            };

            let mut episodes = Vec::new();
            for episode in listing.episodes {
                let Some(episode_remote_id) = episode.id else {
                    warn!(
                        series = %identity.name,
                        season = number,
                        "Episode without remote id skipped"
                    );
                    continue;
                };
                episodes.push(FetchedEpisode {
                    remote_id: episode_remote_id,
                    name: episode.name.unwrap_or_default(),
                    number: episode.episode_number.unwrap_or(0),
                    overview: episode.overview,
                    still_path: episode.still_path,
                });
            }

            seasons.push(FetchedSeason {
                remote_id: season_remote_id,
                number: listing.season_number.unwrap_or(number),
                episodes,
            });
        }

        if seasons.len() as i32 != season_count {
            self.sink.emit(DiagnosticEvent::warning(
                DiagnosticCode::SeasonCountMismatch,
                format!(
                    "'{}' declares {} seasons, fetched {}",
                    identity.name,
                    season_count,
                    seasons.len()
                ),
            ));
        }

        let fetched_episodes = seasons.iter().map(|s| s.episodes.len()).sum::<usize>();
        if fetched_episodes as i32 != episode_count {
            self.sink.emit(DiagnosticEvent::warning(
                DiagnosticCode::EpisodeCountMismatch,
                format!(
                    "'{}' declares {} episodes, fetched {}",
                    identity.name, episode_count, fetched_episodes
                ),
            ));
        }

        info!(
            series = %identity.name,
            seasons = seasons.len(),
            episodes = fetched_episodes,
            "Catalog fetch complete"
        );

        Ok(FetchedSeries {
            remote_id: identity.remote_id,
            name: identity.name,
            original_name: identity.original_name,
            overview: identity.overview,
            poster_path: identity.poster_path,
            season_count,
            episode_count,
            seasons,
        })
    }
}
