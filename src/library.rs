//! In-memory model of the scanned library tree.
//!
//! Three distinct node shapes share the naming capability through
//! [`LibraryNode`]; there is no common base struct. Names are normalized
//! once, at construction, and the season number is inferred once from the
//! raw folder name. Neither is ever re-derived afterwards.

use std::path::PathBuf;

use crate::services::normalizer;

/// Sentinel for a season whose number could not be determined.
pub const UNKNOWN_SEASON: i32 = -1;

/// Naming capability shared by every node in the tree.
pub trait LibraryNode {
    /// Exact on-disk name, immutable once scanned.
    fn raw_name(&self) -> &str;
    /// Canonical form derived deterministically from the raw name.
    fn formatted_name(&self) -> &str;
}

/// A series directory and the seasons discovered beneath it.
#[derive(Debug, Clone)]
pub struct SeriesNode {
    pub raw_name: String,
    pub formatted_name: String,
    pub path: PathBuf,
    pub seasons: Vec<SeasonNode>,
}

impl SeriesNode {
    pub fn new(raw_name: impl Into<String>, path: PathBuf) -> Self {
        let raw_name = raw_name.into();
        let formatted_name = normalizer::normalize_series_name(&raw_name);
        Self {
            raw_name,
            formatted_name,
            path,
            seasons: Vec::new(),
        }
    }
}

impl LibraryNode for SeriesNode {
    fn raw_name(&self) -> &str {
        &self.raw_name
    }

    fn formatted_name(&self) -> &str {
        &self.formatted_name
    }
}

/// A season directory and the episode files discovered beneath it.
#[derive(Debug, Clone)]
pub struct SeasonNode {
    pub raw_name: String,
    pub formatted_name: String,
    pub path: PathBuf,
    /// Inferred from the raw folder name at construction; [`UNKNOWN_SEASON`]
    /// when no strategy matched.
    pub number: i32,
    pub episodes: Vec<EpisodeNode>,
}

impl SeasonNode {
    pub fn new(raw_name: impl Into<String>, path: PathBuf) -> Self {
        let raw_name = raw_name.into();
        let formatted_name = normalizer::normalize_season_name(&raw_name);
        let number = normalizer::season_number_from_raw(&raw_name);
        Self {
            raw_name,
            formatted_name,
            path,
            number,
            episodes: Vec::new(),
        }
    }
}

impl LibraryNode for SeasonNode {
    fn raw_name(&self) -> &str {
        &self.raw_name
    }

    fn formatted_name(&self) -> &str {
        &self.formatted_name
    }
}

/// A single episode file. Leaf node; owns no children.
#[derive(Debug, Clone)]
pub struct EpisodeNode {
    pub raw_name: String,
    /// Canonical form of the stem, the text matched against catalog titles.
    pub formatted_name: String,
    pub path: PathBuf,
    /// Filename with the extension stripped.
    pub original_name: String,
    /// Suffix after the final `.`, without the dot.
    pub extension: String,
}

impl EpisodeNode {
    pub fn new(
        raw_name: impl Into<String>,
        path: PathBuf,
        original_name: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        let raw_name = raw_name.into();
        let original_name = original_name.into();
        let formatted_name = normalizer::normalize_episode_name(&original_name);
        Self {
            raw_name,
            formatted_name,
            path,
            original_name,
            extension: extension.into(),
        }
    }
}

impl LibraryNode for EpisodeNode {
    fn raw_name(&self) -> &str {
        &self.raw_name
    }

    fn formatted_name(&self) -> &str {
        &self.formatted_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_formats_name_at_construction() {
        let series = SeriesNode::new("Show Name (2004)", PathBuf::from("/tv/Show Name (2004)"));
        assert_eq!(series.raw_name, "Show Name (2004)");
        assert_eq!(series.formatted_name, "Show Name");
        assert!(series.seasons.is_empty());
    }

    #[test]
    fn season_infers_number_from_raw_name() {
        let season = SeasonNode::new("season 2", PathBuf::from("/tv/show/season 2"));
        assert_eq!(season.formatted_name, "Season 02");
        assert_eq!(season.number, 2);
    }

    #[test]
    fn season_without_number_keeps_sentinel() {
        let season = SeasonNode::new("Specials", PathBuf::from("/tv/show/Specials"));
        assert_eq!(season.formatted_name, "Specials");
        assert_eq!(season.number, UNKNOWN_SEASON);
    }

    #[test]
    fn episode_keeps_split_parts() {
        let episode = EpisodeNode::new(
            "pilot.mkv",
            PathBuf::from("/tv/show/season 1/pilot.mkv"),
            "pilot",
            "mkv",
        );
        assert_eq!(episode.original_name, "pilot");
        assert_eq!(episode.extension, "mkv");
        assert_eq!(episode.formatted_name, "pilot");
    }

    #[test]
    fn episode_formats_the_stem_without_extension() {
        let episode = EpisodeNode::new(
            "ep (2004).mkv",
            PathBuf::from("/tv/show/season 1/ep (2004).mkv"),
            "ep (2004)",
            "mkv",
        );
        assert_eq!(episode.formatted_name, "ep");
    }

    #[test]
    fn nodes_expose_names_through_the_trait() {
        let series = SeriesNode::new("Show [1999]", PathBuf::from("/tv/Show [1999]"));
        let node: &dyn LibraryNode = &series;
        assert_eq!(node.raw_name(), "Show [1999]");
        assert_eq!(node.formatted_name(), "Show");
    }
}
