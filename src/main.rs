//! Library reconciler binary
//!
//! One run scans LIBRARY_ROOT, resolves every discovered series against the
//! remote catalog and prints the reconciliation report. The rename plan is
//! only applied when APPLY_RENAMES is set.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reconciler::config::Config;
use reconciler::db::Database;
use reconciler::diagnostics::TracingSink;
use reconciler::services::catalog::CatalogClient;
use reconciler::services::filesystem::{rename_entry, FsLister};
use reconciler::services::reconciler::{EngineOptions, ReconciliationEngine, ReconciliationReport};
use reconciler::services::scanner::LibraryScanner;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reconciler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting library reconciler");

    if config.catalog_api_key.is_empty() {
        bail!("No catalog API key configured; set CATALOG_API_KEY or CATALOG_API_KEY_FILE");
    }

    let sink = Arc::new(TracingSink);

    let db = Database::connect(&config.database_url, sink.clone()).await?;
    tracing::info!("Database connected");

    let scanner = LibraryScanner::new(FsLister, sink.clone());
    let scan = scanner.scan(Path::new(&config.library_root))?;
    tracing::info!(series = scan.series.len(), "Library scanned");

    let client = CatalogClient::new(
        config.catalog_base_url.clone(),
        config.catalog_api_key.clone(),
        sink.clone(),
    );

    let engine = ReconciliationEngine::new(
        db.catalog(),
        client,
        sink.clone(),
        EngineOptions {
            start_at_series: config.start_at_series.clone(),
        },
    );
    let report = engine.run(&scan).await?;

    if config.apply_renames {
        apply_renames(&report).await;
    }

    println!("{}", report);

    Ok(())
}

/// Apply the rename plan, collecting failures instead of aborting.
async fn apply_renames(report: &ReconciliationReport) {
    let mut renamed = 0usize;
    let mut errors: Vec<String> = Vec::new();

    for proposal in &report.rename_plan {
        match rename_entry(&proposal.old_path, &proposal.proposed_name).await {
            Ok(new_path) => {
                tracing::info!(
                    from = %proposal.old_path.display(),
                    to = %new_path.display(),
                    "Renamed"
                );
                renamed += 1;
            }
            Err(err) => {
                tracing::warn!(
                    path = %proposal.old_path.display(),
                    error = %err,
                    "Rename failed"
                );
                errors.push(format!(
                    "{} {} {}: {}",
                    proposal.series, proposal.season, proposal.proposed_name, err
                ));
            }
        }
    }

    println!("Rename errors: {}", errors.len());
    for error in &errors {
        println!("\t{}", error);
    }
    println!("Renamed {} items", renamed);
}
