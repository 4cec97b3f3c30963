//! Concurrent TMC scraping with a scripted page source

use crate::common::database::init_fresh_test_database;
use crate::common::{logging, test_data};
use anyhow::{anyhow, Result};
use avenue_tools::api::{DiagnosticsLog, TmcSource};
use avenue_tools::concurrent_fetcher::{fetch_tmc_concurrently, FetchResult, TmcFetchConfig};
use avenue_tools::models::DateRange;
use chrono::{Duration, NaiveDate};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use test_log::test;

/// Serves canned pages keyed by intersection id
struct ScriptedSource {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl TmcSource for ScriptedSource {
    async fn fetch_tmc(&self, intersection_id: &str, _date: NaiveDate) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match intersection_id {
            "6226" => Ok(test_data::tmc_page(&[
                test_data::full_tmc_row("7:00 AM", 1),
                test_data::full_tmc_row("7:15 AM", 5),
            ])),
            "6227" => Ok(test_data::tmc_page(&[
                "<tr><td>7:00 AM</td><td>1</td><td>2</td><td class=\"total\">3</td>\
                 <td>4</td><td>5</td><td>6</td><td>15</td>\
                 <td>7</td><td>8</td><td>9</td><td>24</td>\
                 <td>10</td><td>11</td><td>12</td><td>33</td></tr>"
                    .to_string(),
            ])),
            "6228" => Ok("<html><body>Object reference not set</body></html>".to_string()),
            _ => Err(anyhow!("connection reset")),
        }
    }
}

fn two_days() -> DateRange {
    let start = test_data::test_date();
    DateRange::new(start, start + Duration::days(1))
}

#[test(tokio::test)]
async fn test_fetch_counts_and_stores() {
    logging::init_test_logging();
    logging::log_test_step("Fetching four intersections over two days");

    let db = init_fresh_test_database().await.unwrap();
    let database = Arc::new(db.manager.clone());
    let diagnostics = Arc::new(DiagnosticsLog::new(
        db.path_dir().join("errors.txt"),
        db.path_dir().join("warnings.txt"),
    ));
    let source = Arc::new(ScriptedSource {
        calls: AtomicUsize::new(0),
    });

    let config = TmcFetchConfig {
        intersections: vec!["6226".into(), "6227".into(), "6228".into(), "6229".into()],
        date_range: two_days(),
        max_concurrent: 2,
    };
    let result = fetch_tmc_concurrently(source.clone(), Arc::clone(&database), diagnostics, config)
        .await
        .unwrap();

    assert_eq!(
        result,
        FetchResult {
            total_requests: 8,
            processed: 4,
            failed: 4,
            records_inserted: 2 * (24 + 11),
            warnings: 2,
        }
    );
    assert_eq!(source.calls.load(Ordering::SeqCst), 8);

    let stored = database.get_tmc_records(Some("6226")).await.unwrap();
    assert_eq!(stored.len(), 48);
    assert_eq!(stored[0].direction, "Eastbound");
    assert_eq!(stored[0].movement, "L");
    assert_eq!(stored[0].volume, 1);

    let errors = std::fs::read_to_string(db.path_dir().join("errors.txt")).unwrap();
    assert!(errors.contains("Failed to retrieve data for intersection 6229"));
    assert!(errors.contains("no table found for intersection 6228"));

    let warnings = std::fs::read_to_string(db.path_dir().join("warnings.txt")).unwrap();
    assert!(warnings.contains("Missing data for Eastbound R at 7:00 AM for intersection 6227"));
}

#[test(tokio::test)]
async fn test_fetch_with_no_intersections() {
    logging::init_test_logging();
    let db = init_fresh_test_database().await.unwrap();
    let diagnostics = Arc::new(DiagnosticsLog::new(
        db.path_dir().join("errors.txt"),
        db.path_dir().join("warnings.txt"),
    ));
    let source = Arc::new(ScriptedSource {
        calls: AtomicUsize::new(0),
    });

    let config = TmcFetchConfig {
        intersections: Vec::new(),
        date_range: two_days(),
        max_concurrent: 4,
    };
    let result = fetch_tmc_concurrently(source, Arc::new(db.manager.clone()), diagnostics, config)
        .await
        .unwrap();

    assert_eq!(result, FetchResult::default());
}
