//! Library reconciliation engine
//!
//! Scans a Series/Season/Episode directory tree, resolves each series
//! against a remote catalog, stores the fetched metadata idempotently and
//! proposes renames for episode files missing the canonical `S##E##` marker.

pub mod config;
pub mod db;
pub mod diagnostics;
pub mod library;
pub mod services;
