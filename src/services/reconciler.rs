//! Reconciliation engine
//!
//! Walks the scanned library tree, resolves each series against the catalog
//! record store (fetching from the remote catalog on a miss) and turns the
//! resolved metadata into a rename plan plus a run report. Renames are never
//! performed here; the plan is handed to the caller.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::db::{CatalogRecord, CatalogRepository};
use crate::diagnostics::{DiagnosticCode, DiagnosticEvent, DiagnosticSink};
use crate::library::{SeriesNode, UNKNOWN_SEASON};
use crate::services::catalog::CatalogProvider;
use crate::services::scanner::{LibraryScan, ParseFailure};

/// Seasons abort once more than this many episodes fail to match.
const MAX_UNMATCHED_PER_SEASON: u32 = 2;

/// Resolution state of one scanned series.
///
/// `Resolved` and `Failed` are terminal; the report records only those.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesState {
    Unresolved,
    Fetching,
    Resolved,
    Failed,
}

/// Series that could not be resolved, with the reason
#[derive(Debug, Clone)]
pub struct FailedSeries {
    pub name: String,
    pub reason: String,
}

/// One entry of the rename plan
#[derive(Debug, Clone)]
pub struct RenameProposal {
    pub series: String,
    pub season: String,
    pub old_path: PathBuf,
    pub proposed_name: String,
}

/// Aggregated outcome of one reconciliation run
#[derive(Debug, Default)]
pub struct ReconciliationReport {
    pub resolved_series: usize,
    pub failed_series: Vec<FailedSeries>,
    pub series_states: Vec<(String, SeriesState)>,
    pub skipped_series: Vec<String>,
    pub unnumbered_seasons: Vec<String>,
    pub aborted_seasons: Vec<String>,
    pub already_indexed: Vec<String>,
    pub possibly_indexed: Vec<String>,
    pub unmatched_episodes: Vec<String>,
    pub rename_plan: Vec<RenameProposal>,
    pub failed_parses: Vec<ParseFailure>,
    pub elapsed: Duration,
}

impl fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Resolved {} series", self.resolved_series)?;
        writeln!(f, "Failed series: {}", self.failed_series.len())?;
        for failed in &self.failed_series {
            writeln!(f, "\t{}: {}", failed.name, failed.reason)?;
        }
        writeln!(f, "Skipped series: {}", self.skipped_series.len())?;
        for name in &self.skipped_series {
            writeln!(f, "\t{}", name)?;
        }
        writeln!(f, "Unnumbered season folders: {}", self.unnumbered_seasons.len())?;
        for item in &self.unnumbered_seasons {
            writeln!(f, "\t{}", item)?;
        }
        writeln!(f, "Already indexed episodes: {}", self.already_indexed.len())?;
        writeln!(f, "Possibly indexed episodes: {}", self.possibly_indexed.len())?;
        for item in &self.possibly_indexed {
            writeln!(f, "\t{}", item)?;
        }
        writeln!(f, "Unmatched episodes: {}", self.unmatched_episodes.len())?;
        for item in &self.unmatched_episodes {
            writeln!(f, "\t{}", item)?;
        }
        writeln!(f, "Aborted seasons: {}", self.aborted_seasons.len())?;
        for item in &self.aborted_seasons {
            writeln!(f, "\t{}", item)?;
        }
        writeln!(f, "Failed name parses: {}", self.failed_parses.len())?;
        for failure in &self.failed_parses {
            writeln!(f, "\t{}: {}", failure.path.display(), failure.reason)?;
        }
        writeln!(f, "Rename proposals: {}", self.rename_plan.len())?;
        for proposal in &self.rename_plan {
            writeln!(
                f,
                "\t{} {} {}",
                proposal.series, proposal.season, proposal.proposed_name
            )?;
        }
        write!(
            f,
            "Completed in {:.2} minutes",
            self.elapsed.as_secs_f64() / 60.0
        )
    }
}

/// Engine tuning supplied by the caller
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Resume an interrupted run: series sorting before this letter are skipped.
    pub start_at_series: Option<String>,
}

enum FetchOutcome {
    Stored(Vec<CatalogRecord>),
    Rejected(String),
}

pub struct ReconciliationEngine<P: CatalogProvider> {
    store: CatalogRepository,
    provider: P,
    sink: Arc<dyn DiagnosticSink>,
    options: EngineOptions,
}

impl<P: CatalogProvider> ReconciliationEngine<P> {
    pub fn new(
        store: CatalogRepository,
        provider: P,
        sink: Arc<dyn DiagnosticSink>,
        options: EngineOptions,
    ) -> Self {
        Self {
            store,
            provider,
            sink,
            options,
        }
    }

    /// Reconcile every scanned series and build the run report.
    ///
    /// Series are visited in the order the scan produced them. A series that
    /// fails to resolve is reported and the run continues with the next one.
    pub async fn run(&self, scan: &LibraryScan) -> Result<ReconciliationReport> {
        let started = Instant::now();
        let mut report = ReconciliationReport {
            failed_parses: scan.failed_parses.clone(),
            ..Default::default()
        };

        info!(series = scan.series.len(), "Reconciling scanned library");

        for series in &scan.series {
            if skipped_by_resume(&series.formatted_name, self.options.start_at_series.as_deref()) {
                self.sink.emit(DiagnosticEvent::info(
                    DiagnosticCode::SeriesSkipped,
                    format!("Skipping '{}' before the resume letter", series.formatted_name),
                ));
                report.skipped_series.push(series.formatted_name.clone());
                continue;
            }

            info!(series = %series.formatted_name, "Processing series");
            let records = match self.resolve_series(&series.formatted_name, &mut report).await? {
                Some(records) => records,
                None => continue,
            };
            self.plan_series(series, &records, &mut report);
        }

        report.elapsed = started.elapsed();
        info!(
            resolved = report.resolved_series,
            failed = report.failed_series.len(),
            proposals = report.rename_plan.len(),
            "Reconciliation complete"
        );

        Ok(report)
    }

    /// Drive one series through the resolution states.
    ///
    /// Returns the catalog records backing the series, or `None` when the
    /// series ended up `Failed`.
    async fn resolve_series(
        &self,
        name: &str,
        report: &mut ReconciliationReport,
    ) -> Result<Option<Vec<CatalogRecord>>> {
        let mut state = SeriesState::Unresolved;
        debug!(series = %name, state = ?state, "Resolving series");

        let stored = self.store.lookup(name).await?;
        if !stored.is_empty() {
            debug!(series = %name, records = stored.len(), "Resolved from store");
            self.mark_resolved(name, report);
            return Ok(Some(stored));
        }

        state = SeriesState::Fetching;
        debug!(series = %name, state = ?state, "No stored records, fetching from catalog");

        match self.fetch_and_store(name).await? {
            FetchOutcome::Stored(records) => {
                self.mark_resolved(name, report);
                Ok(Some(records))
            }
            FetchOutcome::Rejected(reason) => {
                self.mark_failed(name, reason, report);
                Ok(None)
            }
        }
    }

    /// Fetch a series from the catalog and persist it under the search string.
    ///
    /// An `Err` is an infrastructure fault in the store; catalog dead ends
    /// come back as `Rejected` so the run can continue.
    async fn fetch_and_store(&self, name: &str) -> Result<FetchOutcome> {
        let fetched = match self.provider.fetch_series(name).await {
            Ok(fetched) => fetched,
            Err(err) => return Ok(FetchOutcome::Rejected(err.to_string())),
        };

        if fetched.fetched_episode_total() == 0 {
            return Ok(FetchOutcome::Rejected(format!(
                "catalog returned no episodes for '{}'",
                name
            )));
        }

        let inserted = self.store.insert_all(&fetched, name).await?;
        if inserted == 0 {
            return Ok(FetchOutcome::Rejected(
                "fetched records were already stored under another name".to_string(),
            ));
        }

        let records = self.store.find_by_search_string(name).await?;
        if records.is_empty() {
            return Ok(FetchOutcome::Rejected(
                "stored records could not be read back".to_string(),
            ));
        }

        Ok(FetchOutcome::Stored(records))
    }

    fn mark_resolved(&self, name: &str, report: &mut ReconciliationReport) {
        report.resolved_series += 1;
        report
            .series_states
            .push((name.to_string(), SeriesState::Resolved));
        self.sink.emit(DiagnosticEvent::info(
            DiagnosticCode::SeriesResolved,
            format!("Resolved '{}'", name),
        ));
    }

    fn mark_failed(&self, name: &str, reason: String, report: &mut ReconciliationReport) {
        warn!(series = %name, reason = %reason, "Series failed to resolve");
        self.sink.emit(DiagnosticEvent::error(
            DiagnosticCode::SeriesFailed,
            format!("Failed to resolve '{}': {}", name, reason),
        ));
        report
            .series_states
            .push((name.to_string(), SeriesState::Failed));
        report.failed_series.push(FailedSeries {
            name: name.to_string(),
            reason,
        });
    }

    /// Classify every episode of a resolved series and grow the rename plan.
    fn plan_series(
        &self,
        series: &SeriesNode,
        records: &[CatalogRecord],
        report: &mut ReconciliationReport,
    ) {
        for season in &series.seasons {
            if season.number == UNKNOWN_SEASON {
                self.sink.emit(DiagnosticEvent::warning(
                    DiagnosticCode::SeasonUnnumbered,
                    format!(
                        "No season number for '{}' in '{}'",
                        season.raw_name, series.formatted_name
                    ),
                ));
                report
                    .unnumbered_seasons
                    .push(format!("{} - {}", series.formatted_name, season.raw_name));
                continue;
            }

            let season_records: Vec<&CatalogRecord> = records
                .iter()
                .filter(|r| r.season_number == i64::from(season.number))
                .collect();

            let mut unmatched = 0u32;
            for episode in &season.episodes {
                if unmatched > MAX_UNMATCHED_PER_SEASON {
                    self.sink.emit(DiagnosticEvent::error(
                        DiagnosticCode::SeasonAborted,
                        format!(
                            "Too many unmatched episodes in '{}' of '{}'",
                            season.formatted_name, series.formatted_name
                        ),
                    ));
                    report.aborted_seasons.push(format!(
                        "{} - {}",
                        series.formatted_name, season.formatted_name
                    ));
                    break;
                }

                if is_already_indexed(&episode.original_name) {
                    debug!(episode = %episode.original_name, "Already indexed");
                    report.already_indexed.push(episode.original_name.clone());
                    continue;
                }

                if hints_season_number(&episode.original_name, season.number) {
                    report.possibly_indexed.push(format!(
                        "{} - {}",
                        series.formatted_name, episode.original_name
                    ));
                    continue;
                }

                match find_episode_number(&season_records, &episode.formatted_name) {
                    Some(number) => {
                        report.rename_plan.push(RenameProposal {
                            series: series.formatted_name.clone(),
                            season: season.formatted_name.clone(),
                            old_path: episode.path.clone(),
                            proposed_name: proposed_file_name(
                                &episode.original_name,
                                season.number,
                                number,
                                &episode.extension,
                            ),
                        });
                    }
                    None => {
                        unmatched += 1;
                        self.sink.emit(DiagnosticEvent::warning(
                            DiagnosticCode::EpisodeUnmatched,
                            format!(
                                "No catalog match for '{}' in '{}' of '{}'",
                                episode.formatted_name,
                                season.formatted_name,
                                series.formatted_name
                            ),
                        ));
                        report
                            .unmatched_episodes
                            .push(episode.original_name.clone());
                    }
                }
            }
        }
    }
}

/// True when the resume letter is set and the name sorts before it.
fn skipped_by_resume(name: &str, start_at: Option<&str>) -> bool {
    let Some(letter) = start_at.and_then(|s| s.chars().next()) else {
        return false;
    };
    let Some(first) = name.chars().next() else {
        return false;
    };
    first.to_ascii_lowercase() < letter.to_ascii_lowercase()
}

/// Stems carrying the canonical `S##E##` marker need no rename.
fn is_already_indexed(stem: &str) -> bool {
    Regex::new(r"S\d+E\d+").unwrap().is_match(stem)
}

/// Stems mentioning the season number right before a digit or an episode
/// delimiter look indexed in some other scheme; they are flagged for review
/// instead of being renamed.
fn hints_season_number(stem: &str, season_number: i32) -> bool {
    let padded = format!("{:02}", season_number);
    let bare = season_number.to_string();
    let mut needles = vec![padded];
    if !needles.contains(&bare) {
        needles.push(bare);
    }

    for needle in &needles {
        for (idx, _) in stem.match_indices(needle.as_str()) {
            let rest = &stem[idx + needle.len()..];
            if let Some(next) = rest.chars().next() {
                if next.is_ascii_digit() || matches!(next, 'x' | 'X' | 'e' | 'E' | '.' | '-' | '_')
                {
                    return true;
                }
            }
        }
    }
    false
}

/// First record in the season whose episode name contains the local stem.
fn find_episode_number(season_records: &[&CatalogRecord], formatted_stem: &str) -> Option<i64> {
    let needle = formatted_stem.to_lowercase();
    season_records
        .iter()
        .find(|record| record.episode_name.to_lowercase().contains(&needle))
        .map(|record| record.episode_number)
}

fn proposed_file_name(stem: &str, season_number: i32, episode_number: i64, extension: &str) -> String {
    format!(
        "{}-S{:02}E{:02}.{}",
        stem, season_number, episode_number, extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(season: i64, episode: i64, name: &str) -> CatalogRecord {
        use chrono::Utc;
        CatalogRecord {
            record_id: format!("1-{}-{}", season, episode),
            episode_name: name.to_string(),
            episode_remote_id: episode,
            episode_number: episode,
            episode_overview: None,
            episode_still_path: None,
            season_number: season,
            season_remote_id: season,
            series_name: "Show".to_string(),
            series_original_name: None,
            series_overview: None,
            series_poster_path: None,
            series_remote_id: 1,
            season_count: 1,
            episode_count: 1,
            search_string: "show".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_already_indexed_pattern() {
        assert!(is_already_indexed("pilot-S01E02"));
        assert!(is_already_indexed("S1E1 something"));
        assert!(!is_already_indexed("pilot-s01e02"));
        assert!(!is_already_indexed("pilot"));
    }

    #[test]
    fn test_hints_season_number() {
        assert!(hints_season_number("show 1x02", 1));
        assert!(hints_season_number("show s01e04", 1));
        assert!(hints_season_number("episode 102", 1));
        assert!(hints_season_number("finale 2-part", 2));
        assert!(!hints_season_number("finale 2", 2));
        assert!(!hints_season_number("part two", 1));
        assert!(!hints_season_number("season opener", 3));
    }

    #[test]
    fn test_skipped_by_resume() {
        assert!(skipped_by_resume("Alpha", Some("m")));
        assert!(!skipped_by_resume("Nova", Some("m")));
        assert!(!skipped_by_resume("Mike", Some("m")));
        assert!(!skipped_by_resume("Alpha", None));
        assert!(!skipped_by_resume("", Some("m")));
    }

    #[test]
    fn test_find_episode_number_is_case_insensitive() {
        let records = vec![record(1, 1, "First Light"), record(1, 2, "Second Dawn")];
        let refs: Vec<&CatalogRecord> = records.iter().collect();

        assert_eq!(find_episode_number(&refs, "second dawn"), Some(2));
        assert_eq!(find_episode_number(&refs, "light"), Some(1));
        assert_eq!(find_episode_number(&refs, "third"), None);
    }

    #[test]
    fn test_proposed_file_name_padding() {
        assert_eq!(proposed_file_name("pilot", 1, 2, "mkv"), "pilot-S01E02.mkv");
        assert_eq!(
            proposed_file_name("finale", 12, 240, "avi"),
            "finale-S12E240.avi"
        );
    }

    #[test]
    fn test_report_display_lists_items() {
        let report = ReconciliationReport {
            resolved_series: 1,
            failed_series: vec![FailedSeries {
                name: "Gone".to_string(),
                reason: "no search results for 'Gone'".to_string(),
            }],
            ..Default::default()
        };

        let rendered = report.to_string();
        assert!(rendered.contains("Resolved 1 series"));
        assert!(rendered.contains("\tGone: no search results for 'Gone'"));
        assert!(rendered.contains("Completed in 0.00 minutes"));
    }
}
