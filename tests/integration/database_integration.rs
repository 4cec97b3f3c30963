//! Database integration tests on a fresh SQLite file

use crate::common::database::init_fresh_test_database;
use crate::common::{logging, test_data};
use avenue_tools::models::atspm::{PcdPhase, SplitFailPhase, SplitMonitorPhase};
use avenue_tools::models::SpeedReading;
use chrono::{DateTime, NaiveDate};
use pretty_assertions::assert_eq;
use serde_json::json;
use test_log::test;

fn split_fail_phase(total_cycles: i64, plan_numbers: &[i64]) -> SplitFailPhase {
    let plans: Vec<_> = plan_numbers
        .iter()
        .map(|n| {
            json!({
                "totalCycles": total_cycles, "failsInPlan": 3, "percentFails": 12.5, "planNumber": n,
                "start": "2024-10-19T06:00:00.000", "end": "2024-10-19T09:00:00", "planDescription": "AM"
            })
        })
        .collect();

    serde_json::from_value(json!({
        "phaseNumber": 2,
        "phaseType": "Primary",
        "totalSplitFails": 3,
        "approachId": 311,
        "approachDescription": "NBT Ph2",
        "locationIdentifier": "7610",
        "locationDescription": "State St & 3300 S",
        "start": "2024-10-19T00:00:00",
        "plans": plans,
        "averageGor": [
            {"value": 45.5, "timestamp": "2024-10-19T06:15:00"},
            {"value": 51.0, "timestamp": "2024-10-19T06:30:00"}
        ]
    }))
    .unwrap()
}

fn pcd_phase() -> PcdPhase {
    serde_json::from_value(json!({
        "phaseNumber": 6,
        "phaseDescription": "Ph6 SBT",
        "locationDescription": "State St & 3300 S",
        "totalOnGreenEvents": 900,
        "totalDetectorHits": 1200,
        "percentArrivalOnGreen": 75.0,
        "plans": [
            {"percentGreenTime": 55.0, "percentArrivalOnGreen": 72.0, "platoonRatio": 1.3, "planNumber": "1",
             "start": "2024-10-19T06:00:00", "end": "2024-10-19T09:00:00", "planDescription": "AM"},
            {"percentGreenTime": 50.0, "percentArrivalOnGreen": 68.0, "platoonRatio": 1.1, "planNumber": "2",
             "start": "2024-10-19T15:00:00", "end": "2024-10-19T18:00:00", "planDescription": "PM"}
        ],
        "volumePerHour": [
            {"value": 400.0, "timestamp": "2024-10-19T06:00:00"},
            {"value": 440.0, "timestamp": "2024-10-19T06:15:00"}
        ]
    }))
    .unwrap()
}

fn split_monitor_phase() -> SplitMonitorPhase {
    serde_json::from_value(json!({
        "phaseNumber": 4,
        "phaseDescription": "Ph4 EBT",
        "locationIdentifier": "7610",
        "plans": [{
            "planNumber": 3, "planDescription": "Midday",
            "start": "2024-10-19T09:00:00.000", "end": "2024-10-19T15:00:00",
            "percentSkips": 0.0, "percentGapOuts": 60.0, "percentMaxOuts": 10.0, "percentForceOffs": 30.0,
            "averageSplit": 28.0, "programmedSplit": 30.0, "percentileSplit50th": 27.0, "percentileSplit85th": 30.0
        }],
        "programmedSplits": [{"value": 30.0, "timestamp": "2024-10-19T09:00:00"}],
        "gapOuts": [{"value": 22.0, "timestamp": "2024-10-19T09:01:40"}]
    }))
    .unwrap()
}

#[test(tokio::test)]
async fn test_database_initialization() {
    logging::init_test_logging();
    let db = init_fresh_test_database().await.unwrap();

    let stats = db.manager.get_stats().await.unwrap();
    assert_eq!(stats.len(), 10);
    assert!(stats.values().all(|&count| count == 0));
    assert!(db.path_dir().join("test.db").exists());
}

#[test(tokio::test)]
async fn test_tmc_insert_and_query() {
    logging::init_test_logging();
    let db = init_fresh_test_database().await.unwrap();

    let records = vec![
        test_data::create_test_tmc_record("6226", "7:00 AM", "Eastbound", "L", 12),
        test_data::create_test_tmc_record("6226", "7:00 AM", "Eastbound", "T", 140),
        test_data::create_test_tmc_record("6227", "7:00 AM", "Northbound", "R", 9),
    ];
    let inserted = db.manager.insert_tmc_records(&records).await.unwrap();
    assert_eq!(inserted, 3);

    let only_6226 = db.manager.get_tmc_records(Some("6226")).await.unwrap();
    assert_eq!(only_6226, records[..2].to_vec());

    let all = db.manager.get_tmc_records(None).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[test(tokio::test)]
async fn test_split_fail_reingest_replaces_child_rows() {
    logging::init_test_logging();
    let db = init_fresh_test_database().await.unwrap();
    let date = test_data::test_date();

    db.manager.save_split_fail_phase(date, &split_fail_phase(90, &[1, 2])).await.unwrap();
    db.manager.save_split_fail_phase(date, &split_fail_phase(24, &[1])).await.unwrap();

    let stats = db.manager.get_stats().await.unwrap();
    assert_eq!(stats["split_fail_phases"], 1);
    assert_eq!(stats["split_fail_plans"], 1);
    assert_eq!(stats["split_fail_occupancy"], 2);

    let plans = db.manager.get_split_fail_plans("7610", "1").await.unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].approach_description.as_deref(), Some("NBT Ph2"));
    assert_eq!(plans[0].start, "2024-10-19T06:00:00");
}

#[test(tokio::test)]
async fn test_split_fail_reingest_without_approach_id() {
    logging::init_test_logging();
    let db = init_fresh_test_database().await.unwrap();
    let date = test_data::test_date();

    let mut first = split_fail_phase(90, &[1, 2]);
    first.approach_id = None;
    let mut second = split_fail_phase(24, &[1]);
    second.approach_id = None;

    db.manager.save_split_fail_phase(date, &first).await.unwrap();
    db.manager.save_split_fail_phase(date, &second).await.unwrap();

    let stats = db.manager.get_stats().await.unwrap();
    assert_eq!(stats["split_fail_phases"], 1);
    assert_eq!(stats["split_fail_plans"], 1);
    assert_eq!(stats["split_fail_occupancy"], 2);

    // a phase with an approach id is kept apart
    db.manager.save_split_fail_phase(date, &split_fail_phase(90, &[1])).await.unwrap();
    let stats = db.manager.get_stats().await.unwrap();
    assert_eq!(stats["split_fail_phases"], 2);
    assert_eq!(stats["split_fail_plans"], 2);
}

#[test(tokio::test)]
async fn test_pcd_plans_and_volumes() {
    logging::init_test_logging();
    let db = init_fresh_test_database().await.unwrap();
    let date = test_data::test_date();

    db.manager.save_pcd_phase("7610", date, &pcd_phase()).await.unwrap();
    // re-ingest keeps one copy
    db.manager.save_pcd_phase("7610", date, &pcd_phase()).await.unwrap();

    let plans = db.manager.get_pcd_plans(Some("7610")).await.unwrap();
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].plan_number, "1");
    assert_eq!(plans[1].platoon_ratio, Some(1.1));

    let morning = NaiveDate::from_ymd_opt(2024, 10, 19).unwrap();
    let am_only = db
        .manager
        .get_pcd_plans_between(
            morning.and_hms_opt(5, 0, 0).unwrap(),
            morning.and_hms_opt(10, 0, 0).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(am_only.len(), 1);
    assert_eq!(am_only[0].plan_description.as_deref(), Some("AM"));

    let volumes = db.manager.get_volume_per_hour(None).await.unwrap();
    assert_eq!(volumes.len(), 2);
    assert!(db.manager.get_pcd_plans(Some("9999")).await.unwrap().is_empty());
}

#[test(tokio::test)]
async fn test_split_monitor_plans() {
    logging::init_test_logging();
    let db = init_fresh_test_database().await.unwrap();

    db.manager
        .save_split_monitor_phase(test_data::test_date(), &split_monitor_phase())
        .await
        .unwrap();

    let plans = db.manager.get_split_monitor_plans("7610", "3").await.unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].phase_number, 4);
    assert_eq!(plans[0].programmed_split, Some(30.0));
    assert_eq!(plans[0].start, "2024-10-19T09:00:00");

    let stats = db.manager.get_stats().await.unwrap();
    assert_eq!(stats["split_monitor_splits"], 2);
}

#[test(tokio::test)]
async fn test_speed_readings_upsert() {
    logging::init_test_logging();
    let db = init_fresh_test_database().await.unwrap();

    let at = |ts: i64| DateTime::from_timestamp(ts, 0).unwrap();
    let first = vec![
        SpeedReading { route_id: 9946, timestamp: at(1_726_812_000), avg_speed: Some(41.5) },
        SpeedReading { route_id: 9946, timestamp: at(1_726_812_300), avg_speed: None },
    ];
    db.manager.insert_speed_readings(&first).await.unwrap();

    let update = vec![SpeedReading { route_id: 9946, timestamp: at(1_726_812_000), avg_speed: Some(39.0) }];
    db.manager.insert_speed_readings(&update).await.unwrap();

    let stored = db.manager.get_speed_readings(9946).await.unwrap();
    logging::log_test_data("speed readings", &stored);
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].avg_speed, Some(39.0));
    assert_eq!(stored[1].avg_speed, None);
}
