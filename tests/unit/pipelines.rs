//! End-to-end runs over small files written to a temp directory

use crate::common::logging;
use avenue_tools::analysis::headway::{calculate_headways, format_headway, read_count_csv};
use avenue_tools::analysis::travel_time::{
    build_travel_time_workbook, match_points, process_runs, DEFAULT_MATCH_THRESHOLD_M, TIME_BINS_SHEET,
    TRAVEL_TIMES_SHEET,
};
use avenue_tools::analysis::volumes::pems_rollup_workbook;
use avenue_tools::parsers::{load_intersections, parse_pems_export, read_gpx_file, read_placemarks};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::path::Path;
use test_log::test;

fn trkpt(lat: f64, lon: f64, time: &str) -> String {
    format!(
        r#"<trkpt lat="{}" lon="{}"><ele>1300.0</ele><time>{}</time></trkpt>"#,
        lat, lon, time
    )
}

fn write_gpx(path: &Path, points: &[String]) {
    let doc = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><name>run</name><trkseg>
    {}
  </trkseg></trk>
</gpx>"#,
        points.join("\n    ")
    );
    std::fs::write(path, doc).unwrap();
}

const STATE_ST_KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>State St</name>
    <Placemark><name>3300 S</name><Point><coordinates>-111.8900,40.7000,0</coordinates></Point></Placemark>
    <Placemark><name>3900 S</name><Point><coordinates>-111.8900,40.7100,0</coordinates></Point></Placemark>
    <Placemark><name>Corridor</name><LineString><coordinates>-111.89,40.70,0 -111.89,40.71,0</coordinates></LineString></Placemark>
  </Document>
</kml>"#;

#[test]
fn test_gpx_travel_times_from_files() {
    logging::init_test_logging();
    logging::log_test_step("GPX runs against an intersection CSV");

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("intersections.csv");
    std::fs::write(
        &csv_path,
        "routeID,segmentID,x,y\nState_3300,3300 S,40.7000,-111.8900\nState_3900,3900 S,40.7100,-111.8900\n",
    )
    .unwrap();

    let gpx_path = dir.path().join("run1.gpx");
    write_gpx(
        &gpx_path,
        &[
            trkpt(40.7000, -111.8900, "2024-07-01T14:00:00Z"),
            trkpt(40.7050, -111.8900, "2024-07-01T14:01:00Z"),
            trkpt(40.7100, -111.8900, "2024-07-01T14:02:00Z"),
        ],
    );

    let intersections = load_intersections(&csv_path).unwrap();
    assert_eq!(intersections.len(), 2);

    let points = read_gpx_file(&gpx_path).unwrap();
    assert_eq!(points.len(), 3);

    let segments = match_points(
        &points,
        &intersections,
        DEFAULT_MATCH_THRESHOLD_M,
        chrono_tz::America::Denver,
    );
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].travel_time, 120.0);

    let runs = process_runs(vec![("run1.gpx".to_string(), segments)]);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].route, "3300 S_to_3900 S");
    assert_eq!(runs[0].run_number, 1);

    let workbook = build_travel_time_workbook(&runs).unwrap();
    let travel = workbook.sheet(TRAVEL_TIMES_SHEET).unwrap();
    assert_eq!(travel.rows.len(), 1);
    let bins = workbook.sheet(TIME_BINS_SHEET).unwrap();
    assert_eq!(bins.rows[0][1], "3300 S_to_3900 S");
}

#[test]
fn test_kml_and_kmz_markers() {
    logging::init_test_logging();
    let dir = tempfile::tempdir().unwrap();

    let kml_path = dir.path().join("state_st.kml");
    std::fs::write(&kml_path, STATE_ST_KML).unwrap();

    let kmz_path = dir.path().join("state_st.kmz");
    {
        let file = std::fs::File::create(&kmz_path).unwrap();
        let mut archive = zip::ZipWriter::new(file);
        archive
            .start_file("doc.kml", zip::write::SimpleFileOptions::default())
            .unwrap();
        archive.write_all(STATE_ST_KML.as_bytes()).unwrap();
        archive.finish().unwrap();
    }

    let from_kml = read_placemarks(&kml_path).unwrap();
    let from_kmz = read_placemarks(&kmz_path).unwrap();
    assert_eq!(from_kml, from_kmz);

    let names: Vec<&str> = from_kml.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["3300 S", "3900 S"]);

    let intersections = load_intersections(&kmz_path).unwrap();
    assert_eq!(intersections[1].segment_id, "3900 S");
    assert!((intersections[1].location.lat - 40.71).abs() < 1e-9);

    assert!(read_placemarks(&dir.path().join("markers.txt")).is_err());
}

#[test]
fn test_pems_export_rollup() {
    logging::init_test_logging();
    logging::log_test_step("PeMS text export through the four rollup queries");

    let export = "Sample Time\t401 Lane 1 Flow\t401 Lane 1 Speed - Used in Calculations\t401 Lane 2 Flow\n\
                  01/02/2024 00:00:00\t10\t60.0\t5\n\
                  01/02/2024 00:05:00\t20\t50.0\t5\n\
                  01/03/2024 00:00:00\t8\t\t2\n";
    let readings = parse_pems_export(export.as_bytes(), "401", "export.tsv").unwrap();
    assert_eq!(readings.len(), 6);
    assert_eq!(readings[1].lane, 2);
    assert_eq!(readings[1].speed, None);

    let workbook = pems_rollup_workbook(&readings).unwrap();
    let names: Vec<&str> = workbook.sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["SumofLanes", "SumofLaneswithDates", "DailyVolumesbyMonth", "DailyVolumesbyMonthAve"]
    );

    let daily = workbook.sheet("DailyVolumesbyMonth").unwrap();
    logging::log_test_data("daily", &daily.rows);
    assert_eq!(daily.rows.len(), 2);
    let volume_idx = daily.headers.iter().position(|h| h == "SumOfSumOfVolume").unwrap();
    assert_eq!(daily.rows[0][volume_idx], "40.0");

    let monthly = workbook.sheet("DailyVolumesbyMonthAve").unwrap();
    assert_eq!(monthly.rows.len(), 1);
}

#[test]
fn test_pems_export_without_station_columns() {
    let export = "Sample Time\t402 Lane 1 Flow\n01/02/2024 00:00:00\t10\n";
    assert!(parse_pems_export(export.as_bytes(), "401", "export.tsv").is_err());
}

#[test]
fn test_headways_from_count_files() {
    logging::init_test_logging();
    let dir = tempfile::tempdir().unwrap();

    let first = dir.path().join("count_am.csv");
    std::fs::write(
        &first,
        "Time Stamp,Vehicle,Direction\n\
         07:00:00,Start,EB\n\
         07:00:05,Car,EB\n\
         07:00:09,Truck,EB\n\
         07:00:20,Stop,EB\n\
         07:05:00,Start,EB\n",
    )
    .unwrap();
    let second = dir.path().join("count_pm.csv");
    std::fs::write(
        &second,
        "Time Stamp,Vehicle,Direction\n\
         17:00:00,Start,WB\n\
         17:00:03,Car,WB\n\
         ,,\n\
         17:00:30,Stop,WB\n",
    )
    .unwrap();

    let files = vec![read_count_csv(&first).unwrap(), read_count_csv(&second).unwrap()];
    let rows = calculate_headways(files);

    // the dangling Start at 07:05 is dropped
    assert_eq!(rows.len(), 7);
    assert_eq!(rows.last().unwrap().run, 2);
    assert_eq!(rows[1].headway_s, Some(5.0));
    assert_eq!(rows[1].group.as_deref(), Some("Car Following Start"));
    assert_eq!(rows[2].group.as_deref(), Some("Truck Following Car"));

    let sheet = format_headway(&rows);
    assert_eq!(sheet.headers, vec!["Car Following Start", "Truck Following Car"]);
    assert_eq!(sheet.rows[0], vec!["5".to_string(), "4".to_string()]);
    assert_eq!(sheet.rows[1], vec!["3".to_string(), String::new()]);
}

#[test]
fn test_count_file_missing_vehicle_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "Time Stamp,Direction\n07:00:00,EB\n").unwrap();

    let err = read_count_csv(&path).unwrap_err();
    assert!(err.to_string().contains("Vehicle"));
}
