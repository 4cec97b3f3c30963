//! ATSPM client tests against a wiremock server

use crate::common::{logging, test_data};
use avenue_tools::api::{AtspmClient, ReportApi, TmcSource};
use pretty_assertions::assert_eq;
use serde_json::json;
use test_log::test;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test(tokio::test)]
async fn test_fetch_tmc_returns_page() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();
    let page = test_data::tmc_page(&[test_data::full_tmc_row("7:00 AM", 1)]);

    Mock::given(method("POST"))
        .and(path("/ATSPM/DefaultCharts/GetTMCMetric"))
        .and(body_partial_json(json!({ "SignalID": "6226" })))
        .respond_with(ResponseTemplate::new(200).set_body_string(page.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let client = AtspmClient::new(&test_data::test_config(&server.uri(), logs.path())).unwrap();
    let html = client.fetch_tmc("6226", test_data::test_date()).await.unwrap();

    assert_eq!(html, page);
}

#[test(tokio::test)]
async fn test_server_error_page_is_retried_and_logged() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();
    let config = test_data::test_config(&server.uri(), logs.path());

    Mock::given(method("POST"))
        .and(path("/ATSPM/DefaultCharts/GetTMCMetric"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html>Object reference not set to an instance of an object.</html>"),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ATSPM/DefaultCharts/GetTMCMetric"))
        .respond_with(ResponseTemplate::new(200).set_body_string(test_data::tmc_page(&[])))
        .mount(&server)
        .await;

    let client = AtspmClient::new(&config).unwrap();
    let html = client.fetch_tmc("6226", test_data::test_date()).await.unwrap();
    assert!(html.contains("table-condensed"));

    let errors = std::fs::read_to_string(&config.error_log_path).unwrap();
    logging::log_test_data("error log", &errors);
    assert!(errors.contains("intersection 6226 on 10/19/2024"));
    assert!(errors.contains("(Attempt 1/3)"));
}

#[test(tokio::test)]
async fn test_fetch_tmc_gives_up_on_http_errors() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/ATSPM/DefaultCharts/GetTMCMetric"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = AtspmClient::new(&test_data::test_config(&server.uri(), logs.path())).unwrap();
    let result = client.fetch_tmc("6226", test_data::test_date()).await;

    assert!(result.is_err());
}

#[test(tokio::test)]
async fn test_split_failure_report() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();

    let body = json!([{
        "phaseNumber": 2,
        "phaseType": "Primary",
        "totalSplitFails": 14,
        "approachId": 311,
        "approachDescription": "NBT Ph2",
        "locationIdentifier": "7610",
        "locationDescription": "State St & 3300 S",
        "start": "2024-10-19T00:00:00",
        "plans": [{
            "totalCycles": 90, "failsInPlan": 3, "percentFails": 3.3, "planNumber": 1,
            "start": "2024-10-19T00:00:00", "end": "2024-10-19T06:00:00", "planDescription": "Plan 1"
        }]
    }]);

    Mock::given(method("POST"))
        .and(path("/v1/SplitFail/GetReportData"))
        .and(body_partial_json(json!({ "locationIdentifier": "7610" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let client = AtspmClient::new(&test_data::test_config(&server.uri(), logs.path())).unwrap();
    let phases = client
        .split_failure("7610", test_data::test_date())
        .await
        .unwrap()
        .expect("phases should decode");

    assert_eq!(phases.len(), 1);
    assert_eq!(phases[0].approach_id, Some(311));
    assert_eq!(phases[0].plans[0].plan_number, "1");
}

#[test(tokio::test)]
async fn test_invalid_report_json_is_skipped() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();
    let config = test_data::test_config(&server.uri(), logs.path());

    Mock::given(method("POST"))
        .and(path("/v1/PurdueCoordinationDiagram/GetReportData"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = AtspmClient::new(&config).unwrap();
    let result = client.purdue_coordination("7610", test_data::test_date()).await.unwrap();

    assert!(result.is_none());
    let errors = std::fs::read_to_string(&config.error_log_path).unwrap();
    assert!(errors.contains("Error decoding PurdueCoordinationDiagram JSON for location 7610"));
}

#[test(tokio::test)]
async fn test_report_http_error_is_an_error() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/SplitMonitor/GetReportData"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = AtspmClient::new(&test_data::test_config(&server.uri(), logs.path())).unwrap();
    let err = client.split_monitor("7610", test_data::test_date()).await.unwrap_err();

    assert!(err.to_string().contains("500"));
}
