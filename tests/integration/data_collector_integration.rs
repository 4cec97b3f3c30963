//! ATSPM report collection with a scripted report API

use crate::common::database::init_fresh_test_database;
use crate::common::{logging, test_data};
use anyhow::{anyhow, Result};
use avenue_tools::api::{DiagnosticsLog, ReportApi};
use avenue_tools::data_collector::{AtspmReport, CollectSummary, DataCollector};
use avenue_tools::models::atspm::{PcdPhase, SplitFailPhase, SplitMonitorPhase};
use avenue_tools::models::DateRange;
use chrono::{Duration, NaiveDate};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use test_log::test;

/// "7610" answers, "7611" returns undecodable data, anything else fails
struct ScriptedReports;

fn phase_for(location: &str, date: NaiveDate) -> SplitFailPhase {
    serde_json::from_value(json!({
        "phaseNumber": 2,
        "approachId": 311,
        "locationIdentifier": location,
        "start": format!("{}T00:00:00", date),
        "plans": [{
            "totalCycles": 90, "failsInPlan": 3, "percentFails": 3.3, "planNumber": 1,
            "start": format!("{}T06:00:00", date), "end": format!("{}T09:00:00", date)
        }]
    }))
    .unwrap()
}

#[async_trait::async_trait]
impl ReportApi for ScriptedReports {
    async fn split_failure(&self, location: &str, date: NaiveDate) -> Result<Option<Vec<SplitFailPhase>>> {
        match location {
            "7610" => Ok(Some(vec![phase_for(location, date)])),
            "7611" => Ok(None),
            _ => Err(anyhow!("API request failed with status 502 Bad Gateway")),
        }
    }

    async fn purdue_coordination(&self, _location: &str, _date: NaiveDate) -> Result<Option<Vec<PcdPhase>>> {
        let phase: PcdPhase = serde_json::from_value(json!({
            "phaseNumber": 6,
            "plans": [{"planNumber": "1", "start": "2024-10-19T06:00:00", "end": "2024-10-19T09:00:00"}],
            "volumePerHour": [{"value": 400.0, "timestamp": "2024-10-19T06:00:00"}]
        }))?;
        Ok(Some(vec![phase]))
    }

    async fn split_monitor(&self, _location: &str, _date: NaiveDate) -> Result<Option<Vec<SplitMonitorPhase>>> {
        Ok(Some(Vec::new()))
    }
}

fn three_days() -> DateRange {
    let start = test_data::test_date();
    DateRange::new(start, start + Duration::days(2))
}

#[test(tokio::test)]
async fn test_collect_split_failure() {
    logging::init_test_logging();
    let db = init_fresh_test_database().await.unwrap();
    let database = Arc::new(db.manager.clone());
    let diagnostics = Arc::new(DiagnosticsLog::new(
        db.path_dir().join("errors.txt"),
        db.path_dir().join("warnings.txt"),
    ));

    let collector = DataCollector::new(Arc::new(ScriptedReports), Arc::clone(&database), diagnostics);
    let locations = vec!["7610".to_string(), "7611".to_string(), "7612".to_string()];
    let summary = collector
        .collect_report(AtspmReport::SplitFailure, &locations, three_days())
        .await
        .unwrap();

    assert_eq!(
        summary,
        CollectSummary {
            requests: 9,
            phases_stored: 3,
            skipped: 3,
            failed: 3,
        }
    );

    let stats = database.get_stats().await.unwrap();
    assert_eq!(stats["split_fail_phases"], 3);
    assert_eq!(stats["split_fail_plans"], 3);

    let errors = std::fs::read_to_string(db.path_dir().join("errors.txt")).unwrap();
    assert!(errors.contains("Request failed for location 7612 on 2024-10-19"));
}

#[test(tokio::test)]
async fn test_collect_pcd_stores_under_requested_location() {
    logging::init_test_logging();
    let db = init_fresh_test_database().await.unwrap();
    let database = Arc::new(db.manager.clone());
    let diagnostics = Arc::new(DiagnosticsLog::new(
        db.path_dir().join("errors.txt"),
        db.path_dir().join("warnings.txt"),
    ));

    let collector = DataCollector::new(Arc::new(ScriptedReports), Arc::clone(&database), diagnostics);
    let one_day = DateRange::new(test_data::test_date(), test_data::test_date());
    let summary = collector
        .collect_report(AtspmReport::PurdueCoordination, &["7610".to_string()], one_day)
        .await
        .unwrap();

    assert_eq!(summary.phases_stored, 1);
    let plans = database.get_pcd_plans(Some("7610")).await.unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(database.get_volume_per_hour(Some("7610")).await.unwrap().len(), 1);
}

#[test(tokio::test)]
async fn test_collect_empty_split_monitor() {
    logging::init_test_logging();
    let db = init_fresh_test_database().await.unwrap();
    let diagnostics = Arc::new(DiagnosticsLog::new(
        db.path_dir().join("errors.txt"),
        db.path_dir().join("warnings.txt"),
    ));

    let collector = DataCollector::new(Arc::new(ScriptedReports), Arc::new(db.manager.clone()), diagnostics);
    let summary = collector
        .collect_report(AtspmReport::SplitMonitor, &["7610".to_string()], three_days())
        .await
        .unwrap();

    assert_eq!(summary.requests, 3);
    assert_eq!(summary.phases_stored, 0);
    assert_eq!(summary.failed, 0);
}
