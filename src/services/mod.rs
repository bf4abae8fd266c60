//! Reconciliation pipeline services

pub mod catalog;
pub mod filesystem;
pub mod normalizer;
pub mod rate_limiter;
pub mod reconciler;
pub mod scanner;

pub use catalog::{
    CatalogClient, CatalogError, CatalogProvider, FetchedEpisode, FetchedSeason, FetchedSeries,
};
pub use filesystem::{DirectoryLister, FsLister};
pub use rate_limiter::{RateLimitConfig, RateLimitedClient, RetryConfig};
pub use reconciler::{
    EngineOptions, ReconciliationEngine, ReconciliationReport, RenameProposal, SeriesState,
};
pub use scanner::{LibraryScan, LibraryScanner, ParseFailure};
