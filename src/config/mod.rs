//! Application configuration management

use std::env;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (SQLite)
    pub database_url: String,

    /// Root directory of the Series/Season/Episode library
    pub library_root: String,

    /// Base URL of the remote catalog API
    pub catalog_base_url: String,

    /// Catalog API key, read from CATALOG_API_KEY or a key file
    pub catalog_api_key: String,

    /// Apply the rename plan instead of only reporting it
    pub apply_renames: bool,

    /// Resume an interrupted run at the series starting with this letter
    pub start_at_series: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://reconciler.db".to_string());

        let library_root = env::var("LIBRARY_ROOT").context("LIBRARY_ROOT is required")?;

        // CATALOG_API_KEY takes precedence over CATALOG_API_KEY_FILE
        let catalog_api_key = match env::var("CATALOG_API_KEY") {
            Ok(key) => key.trim().to_string(),
            Err(_) => match env::var("CATALOG_API_KEY_FILE") {
                Ok(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read CATALOG_API_KEY_FILE at {}", path))?
                    .trim()
                    .to_string(),
                Err(_) => String::new(),
            },
        };

        Ok(Self {
            database_url,

            library_root,

            catalog_base_url: env::var("CATALOG_BASE_URL")
                .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string()),

            catalog_api_key,

            apply_renames: env::var("APPLY_RENAMES")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),

            start_at_series: env::var("START_AT_SERIES").ok(),
        })
    }
}
