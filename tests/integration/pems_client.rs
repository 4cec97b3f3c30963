//! PeMS export downloads against a wiremock server

use crate::common::{logging, test_data};
use avenue_tools::api::PemsClient;
use avenue_tools::models::DateRange;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use std::time::Duration;
use test_log::test;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EXPORT: &str = "Sample Time\tLane 1 Flow\tLane 1 Speed\n01/01/2024 00:00:00\t12\t64.2\n";

fn january(start: u32, end: u32) -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, start).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, end).unwrap(),
    )
}

#[test(tokio::test)]
async fn test_new_requires_session() {
    let logs = tempfile::tempdir().unwrap();
    let mut config = test_data::test_config("http://localhost", logs.path());
    config.pems_session_id = None;

    assert!(PemsClient::new(&config).is_err());
}

#[test(tokio::test)]
async fn test_download_station_writes_one_file_per_window() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("station_id", "401"))
        .and(query_param("export", "text"))
        .and(header("Cookie", "PHPSESSID=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EXPORT))
        .expect(2)
        .mount(&server)
        .await;

    let client = PemsClient::new(&test_data::test_config(&server.uri(), logs.path())).unwrap();
    let files = client
        .download_station("401", january(1, 10), "5min", "speed", out.path())
        .await
        .unwrap();

    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "Jan-01-2024_Jan-07-2024_5min_401.tsv".to_string(),
            "Jan-08-2024_Jan-10-2024_5min_401.tsv".to_string(),
        ]
    );
    assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), EXPORT);
}

#[test(tokio::test)]
async fn test_server_error_is_retried() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EXPORT))
        .mount(&server)
        .await;

    let client = PemsClient::new(&test_data::test_config(&server.uri(), logs.path()))
        .unwrap()
        .with_retry_delay(Duration::ZERO);
    let body = client.fetch_window("401", january(1, 1), "sec", "speed").await.unwrap();

    assert_eq!(body, EXPORT);
}

#[test(tokio::test)]
async fn test_persistent_server_error_gives_up() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let client = PemsClient::new(&test_data::test_config(&server.uri(), logs.path()))
        .unwrap()
        .with_retry_delay(Duration::ZERO);
    let result = client.fetch_window("401", january(1, 1), "sec", "speed").await;

    assert!(result.is_err());
}
