//! Library scanner
//!
//! Walks a root directory exactly three levels deep (series folders, season
//! folders, episode files) through an injected [`DirectoryLister`], applies
//! the skip filter at every level, and builds the in-memory tree. Names are
//! normalized as nodes are constructed, never afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::info;

use super::filesystem::DirectoryLister;
use crate::diagnostics::{DiagnosticCode, DiagnosticEvent, DiagnosticSink};
use crate::library::{EpisodeNode, SeasonNode, SeriesNode};

/// Entry names that never hold episode content, matched case-insensitively.
const SKIP_NAMES: &[&str] = &[
    "metadata",
    "folder.jpg",
    "folder.png",
    "commentaries",
    "cover.jpg",
    "logo.png",
    "extras",
    "sample",
];

/// Extensions of artwork and metadata sidecars, matched case-insensitively.
const SKIP_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "txt", "gif", "nfo"];

/// A filename the episode splitter could not handle.
#[derive(Debug, Clone)]
pub struct ParseFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Everything one scan produced.
#[derive(Debug)]
pub struct LibraryScan {
    pub series: Vec<SeriesNode>,
    pub failed_parses: Vec<ParseFailure>,
}

/// Builds the Series -> Season -> Episode tree for one library root.
pub struct LibraryScanner<L: DirectoryLister> {
    lister: L,
    sink: Arc<dyn DiagnosticSink>,
}

impl<L: DirectoryLister> LibraryScanner<L> {
    pub fn new(lister: L, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { lister, sink }
    }

    /// Scan the root and return the tree plus the failed-parse list.
    ///
    /// Fails only when the root has zero subdirectories. Empty or skipped
    /// branches below the root are reported through the sink and excluded
    /// from their parent, never fatal.
    pub fn scan(&self, root: &Path) -> Result<LibraryScan> {
        let series_folders = self.lister.subdirectories(root);
        if series_folders.is_empty() {
            bail!("No series directories found in {}", root.display());
        }

        info!(
            root = %root.display(),
            candidates = series_folders.len(),
            "Scanning library"
        );

        let mut scan = LibraryScan {
            series: Vec::new(),
            failed_parses: Vec::new(),
        };

        for series_folder in series_folders {
            if should_skip(&series_folder) {
                self.sink.emit(DiagnosticEvent::info(
                    DiagnosticCode::EntrySkipped,
                    format!("Skipping {}", series_folder),
                ));
                continue;
            }

            let series_path = root.join(&series_folder);
            let mut series = SeriesNode::new(series_folder, series_path.clone());

            for season_folder in self.lister.subdirectories(&series_path) {
                if should_skip(&season_folder) {
                    self.sink.emit(DiagnosticEvent::info(
                        DiagnosticCode::EntrySkipped,
                        format!("Skipping {} in {}", season_folder, series.raw_name),
                    ));
                    continue;
                }

                let season_path = series_path.join(&season_folder);
                let mut season = SeasonNode::new(season_folder, season_path.clone());

                for file_name in self.lister.files(&season_path) {
                    if should_skip(&file_name) {
                        self.sink.emit(DiagnosticEvent::info(
                            DiagnosticCode::EntrySkipped,
                            format!("Skipping {} in {}", file_name, season.raw_name),
                        ));
                        continue;
                    }

                    let file_path = season_path.join(&file_name);
                    match split_name_extension(&file_name) {
                        Some((stem, extension)) => {
                            season
                                .episodes
                                .push(EpisodeNode::new(file_name, file_path, stem, extension));
                        }
                        None => {
                            self.sink.emit(DiagnosticEvent::error(
                                DiagnosticCode::EpisodeParseFailed,
                                format!("Could not split name and extension from {}", file_name),
                            ));
                            scan.failed_parses.push(ParseFailure {
                                path: file_path,
                                reason: "missing extension separator".to_string(),
                            });
                        }
                    }
                }

                if season.episodes.is_empty() {
                    self.sink.emit(DiagnosticEvent::error(
                        DiagnosticCode::EmptySeason,
                        format!("No episode files found in {}", season.raw_name),
                    ));
                    continue;
                }
                series.seasons.push(season);
            }

            if series.seasons.is_empty() {
                self.sink.emit(DiagnosticEvent::error(
                    DiagnosticCode::EmptySeries,
                    format!("No season directories found in {}", series.raw_name),
                ));
                continue;
            }
            scan.series.push(series);
        }

        info!(
            series = scan.series.len(),
            failed_parses = scan.failed_parses.len(),
            "Scan complete"
        );

        Ok(scan)
    }
}

/// Blocklist check applied to every directory and file name.
fn should_skip(name: &str) -> bool {
    let lower = name.to_lowercase();
    if SKIP_NAMES.contains(&lower.as_str()) {
        return true;
    }
    match lower.rsplit_once('.') {
        Some((_, extension)) => SKIP_EXTENSIONS.contains(&extension),
        None => false,
    }
}

/// Split a filename on its rightmost dot into (stem, extension).
///
/// Both parts must be non-empty; anything else is a parse failure the
/// caller records.
fn split_name_extension(filename: &str) -> Option<(String, String)> {
    let (stem, extension) = filename.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some((stem.to_string(), extension.to_string()))
}
