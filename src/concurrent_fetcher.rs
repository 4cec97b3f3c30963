//! Concurrent TMC scraping
//!
//! Every intersection for a date is requested at once, bounded by a
//! semaphore. Each intersection-day is parsed and stored in its own
//! transaction so one failure never drops another's rows.

use anyhow::Result;
use chrono::NaiveDate;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::api::{DiagnosticsLog, TmcSource};
use crate::database::DatabaseManager;
use crate::models::DateRange;
use crate::parsers::parse_tmc_table;

/// Configuration for concurrent fetching
#[derive(Debug, Clone)]
pub struct TmcFetchConfig {
    pub intersections: Vec<String>,
    pub date_range: DateRange,
    pub max_concurrent: usize,
}

/// Result of concurrent fetching operation
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FetchResult {
    pub total_requests: usize,
    pub processed: usize,
    pub failed: usize,
    pub records_inserted: usize,
    pub warnings: usize,
}

enum Outcome {
    Stored { records: usize, warnings: usize },
    Failed,
}

async fn fetch_one(
    source: &(dyn TmcSource + Send + Sync),
    database: &DatabaseManager,
    diagnostics: &DiagnosticsLog,
    intersection_id: &str,
    date: NaiveDate,
) -> Outcome {
    let html = match source.fetch_tmc(intersection_id, date).await {
        Ok(html) => html,
        Err(e) => {
            diagnostics
                .error(&format!(
                    "Failed to retrieve data for intersection {} on {}: {:#}",
                    intersection_id,
                    date.format("%m/%d/%Y"),
                    e
                ))
                .await;
            return Outcome::Failed;
        }
    };

    let parsed = match parse_tmc_table(&html, intersection_id, date) {
        Ok(parsed) => parsed,
        Err(e) => {
            diagnostics.error(&e.to_string()).await;
            return Outcome::Failed;
        }
    };

    diagnostics.warnings(&parsed.warnings).await;

    match database.insert_tmc_records(&parsed.records).await {
        Ok(records) => {
            info!(
                "✅ Intersection {} on {}: {} rows stored",
                intersection_id, date, records
            );
            Outcome::Stored {
                records,
                warnings: parsed.warnings.len(),
            }
        }
        Err(e) => {
            diagnostics
                .error(&format!(
                    "Failed to store data for intersection {} on {}: {}",
                    intersection_id, date, e
                ))
                .await;
            Outcome::Failed
        }
    }
}

/// Scrape, parse and store TMC data for every intersection × date
pub async fn fetch_tmc_concurrently(
    source: Arc<dyn TmcSource + Send + Sync>,
    database: Arc<DatabaseManager>,
    diagnostics: Arc<DiagnosticsLog>,
    config: TmcFetchConfig,
) -> Result<FetchResult> {
    info!(
        "🚀 Fetching TMC data for {} intersections, {} to {} ({} concurrent)",
        config.intersections.len(),
        config.date_range.start,
        config.date_range.end,
        config.max_concurrent
    );

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
    let mut result = FetchResult::default();

    for date in config.date_range.days() {
        info!("📅 Processing {}", date);

        let mut handles = Vec::with_capacity(config.intersections.len());
        for intersection_id in &config.intersections {
            let permit = Arc::clone(&semaphore).acquire_owned().await?;
            let source = Arc::clone(&source);
            let database = Arc::clone(&database);
            let diagnostics = Arc::clone(&diagnostics);
            let intersection_id = intersection_id.clone();

            handles.push(tokio::spawn(async move {
                let outcome = fetch_one(source.as_ref(), &database, &diagnostics, &intersection_id, date).await;
                drop(permit);
                outcome
            }));
        }

        for outcome in join_all(handles).await {
            result.total_requests += 1;
            match outcome? {
                Outcome::Stored { records, warnings } => {
                    result.processed += 1;
                    result.records_inserted += records;
                    result.warnings += warnings;
                }
                Outcome::Failed => result.failed += 1,
            }
        }
    }

    if result.failed > 0 {
        error!("❌ {} of {} intersection-days failed", result.failed, result.total_requests);
    }
    info!(
        "📊 Results: {} processed, {} failed, {} records inserted, {} warnings",
        result.processed, result.failed, result.records_inserted, result.warnings
    );

    Ok(result)
}
