//! Report generation from stored counts

use crate::common::database::init_fresh_test_database;
use crate::common::{logging, test_data};
use avenue_tools::analysis::signal::dedupe_tmc;
use avenue_tools::analysis::volumes::{read_station_rules, tmc_rollup_workbook};
use avenue_tools::report::{write_csv, write_report, Sheet, Workbook};
use pretty_assertions::assert_eq;
use test_log::test;

#[test(tokio::test)]
async fn test_stored_tmc_to_station_report() {
    logging::init_test_logging();
    logging::log_test_step("Stored TMC rows through the station rollup into a report folder");

    let db = init_fresh_test_database().await.unwrap();
    let records = vec![
        test_data::create_test_tmc_record("6226", "7:00 AM", "Northbound", "T", 100),
        test_data::create_test_tmc_record("6226", "7:15 AM", "Northbound", "T", 120),
        test_data::create_test_tmc_record("6226", "7:15 AM", "Northbound", "L", 30),
        test_data::create_test_tmc_record("6226", "8:00 AM", "Southbound", "R", 15),
        test_data::create_test_tmc_record("6226", "8:00 AM", "Eastbound", "T", 99),
    ];
    db.manager.insert_tmc_records(&records).await.unwrap();

    let rules_path = db.path_dir().join("stations.csv");
    std::fs::write(
        &rules_path,
        "direction,movement,station_direction\nNorthbound,T,NB\nNorthbound,*,NB_ALL\nSouthbound,*,SB\n",
    )
    .unwrap();
    let rules = read_station_rules(&rules_path).unwrap();
    assert_eq!(rules.len(), 3);

    let stored = db.manager.get_tmc_records(Some("6226")).await.unwrap();
    let workbook = tmc_rollup_workbook(&stored, &rules).unwrap();

    let hourly = workbook.sheet("Daily_format").unwrap();
    let station_idx = hourly.headers.iter().position(|h| h == "StationID").unwrap();
    let volume_idx = hourly.headers.iter().position(|h| h == "SumOfVolume").unwrap();
    let summary: Vec<(String, String)> = hourly
        .rows
        .iter()
        .map(|r| (r[station_idx].clone(), r[volume_idx].clone()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("6226_NB".to_string(), "220.0".to_string()),
            ("6226_NB_ALL".to_string(), "30.0".to_string()),
            ("6226_SB".to_string(), "15.0".to_string()),
        ]
    );

    let out = db.path_dir().join("tmc_report");
    let index = write_report(&out, "TMC Station Volumes", &workbook).unwrap();
    assert!(index.ends_with("index.html"));
    for file in ["tmc_data.csv", "daily_format.csv", "daily_volumes.csv", "monthly_format.csv"] {
        assert!(out.join(file).exists(), "{} should be written", file);
    }
    let html = std::fs::read_to_string(&index).unwrap();
    assert!(html.contains("TMC Station Volumes"));
    assert!(html.contains("Daily_volumes"));
}

#[test(tokio::test)]
async fn test_stored_duplicates_split_out() {
    logging::init_test_logging();
    let db = init_fresh_test_database().await.unwrap();

    let row = test_data::create_test_tmc_record("6226", "7:00 AM", "Northbound", "T", 100);
    let other = test_data::create_test_tmc_record("6226", "7:00 AM", "Northbound", "L", 12);
    // the same page scraped twice
    db.manager.insert_tmc_records(&[row.clone(), other.clone()]).await.unwrap();
    db.manager.insert_tmc_records(&[row.clone()]).await.unwrap();

    let stored = db.manager.get_tmc_records(None).await.unwrap();
    let result = dedupe_tmc(&stored);

    assert_eq!(result.kept, vec![row.clone(), other]);
    assert_eq!(result.duplicated, vec![row.clone(), row]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deduplicated.csv");
    write_csv(&path, &result.kept).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written.lines().count(), 3);
    assert!(written.starts_with("intersection_id,date,time,direction,movement,volume"));
}

#[test]
fn test_sheet_file_names_and_blank_headers() {
    let mut workbook = Workbook::new();
    workbook
        .add_sheet(Sheet::new("Speed Changes", vec!["route_id".into()]))
        .add_sheet(Sheet::new("Window 1", Vec::new()));

    let dir = tempfile::tempdir().unwrap();
    let written = workbook.write_dir(dir.path()).unwrap();

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["speed_changes.csv", "window_1.csv"]);
    assert_eq!(std::fs::read_to_string(&written[1]).unwrap(), "");
}
