//! ClearGuide client tests against a wiremock server

use crate::common::{logging, test_data};
use avenue_tools::api::clearguide_client::RouteQuery;
use avenue_tools::api::ClearGuideClient;
use avenue_tools::models::clearguide::DataDownloadRequest;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use test_log::test;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn query(route_id: i64) -> RouteQuery {
    RouteQuery {
        route_id,
        s_timestamp: 1_726_812_000,
        e_timestamp: 1_726_898_399,
        granularity: "5min".to_string(),
        include_holidays: true,
    }
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "access-1",
            "refresh": "refresh-1"
        })))
        .mount(server)
        .await;
}

#[test(tokio::test)]
async fn test_new_requires_credentials() {
    let logs = tempfile::tempdir().unwrap();
    let mut config = test_data::test_config("http://localhost", logs.path());
    config.clearguide_password = None;

    assert!(ClearGuideClient::new(&config).is_err());
}

#[test(tokio::test)]
async fn test_timeseries() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/route/timeseries/"))
        .and(query_param("route_id", "9946"))
        .and(query_param("route_id_type", "customer_route_number"))
        .and(query_param("metrics", "avg_speed"))
        .and(query_param("granularity", "5min"))
        .and(header("Authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "series": { "all": { "avg_speed": { "data": [
                [1726812000, 41.5],
                [1726812300, null]
            ]}}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ClearGuideClient::new(&test_data::test_config(&server.uri(), logs.path())).unwrap();
    let points = client.timeseries(&query(9946)).await.unwrap();

    assert_eq!(points, vec![(1_726_812_000.0, Some(41.5)), (1_726_812_300.0, None)]);
}

#[test(tokio::test)]
async fn test_unauthorized_refreshes_token_once() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "access-2" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/route/timeseries/"))
        .and(header("Authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/route/timeseries/"))
        .and(header("Authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "series": { "all": { "avg_speed": { "data": [[1726812000, 38.0]] }}}
        })))
        .mount(&server)
        .await;

    let client = ClearGuideClient::new(&test_data::test_config(&server.uri(), logs.path())).unwrap();
    let points = client.timeseries(&query(9946)).await.unwrap();

    assert_eq!(points, vec![(1_726_812_000.0, Some(38.0))]);
}

#[test(tokio::test)]
async fn test_repeated_unauthorized_is_an_error() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "access-2" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/route/timeseries/"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(2)
        .mount(&server)
        .await;

    let client = ClearGuideClient::new(&test_data::test_config(&server.uri(), logs.path())).unwrap();
    let err = client.timeseries(&query(9946)).await.unwrap_err();

    assert!(err.to_string().contains("403"));
}

#[test(tokio::test)]
async fn test_contour_error_flag() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/route/spatial/contours/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": true,
            "msg": "Route not found"
        })))
        .mount(&server)
        .await;

    let client = ClearGuideClient::new(&test_data::test_config(&server.uri(), logs.path())).unwrap();
    let err = client.contours(&query(1)).await.unwrap_err();

    assert!(err.to_string().contains("Route not found"));
}

#[test(tokio::test)]
async fn test_contours() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/route/spatial/contours/"))
        .and(query_param("granularity", "hour"))
        .and(query_param("holidays", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "series": { "all": { "avg_speed": { "data": [
                [1726812000, [[0.0, 35.0], [0.25, null]]]
            ]}}}
        })))
        .mount(&server)
        .await;

    let client = ClearGuideClient::new(&test_data::test_config(&server.uri(), logs.path())).unwrap();
    let mut q = query(9946);
    q.granularity = "hour".to_string();
    q.include_holidays = false;
    let points = client.contours(&q).await.unwrap();

    assert_eq!(points.len(), 1);
    assert_eq!(points[0].1, vec![(0.0, Some(35.0)), (0.25, None)]);
}

#[test(tokio::test)]
async fn test_create_and_download() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    let name = "UT Download 2024-10-19";
    Mock::given(method("POST"))
        .and(path("/v1/data_downloader/data_downloader/"))
        .and(query_param("customer_key", "ut"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/data_downloader/data_downloader/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 41, "name": "UT Download 2024-10-18" },
            { "id": 42, "name": name }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/data_downloader/data_downloader_download/42/"))
        .and(query_param("jwt", "access-1"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "msg": "Please check again soon." })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/data_downloader/data_downloader_download/42/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x1f, 0x8b, 0x08]))
        .mount(&server)
        .await;

    let client = ClearGuideClient::new(&test_data::test_config(&server.uri(), logs.path()))
        .unwrap()
        .with_polling(Duration::from_millis(1), 5);

    let request = DataDownloadRequest::daily(name, 1_729_296_000, "state:ut", "America/Denver");
    let id = client.create_download(&request).await.unwrap();
    assert_eq!(id, 42);

    let saved = client.download(id, name, out.path()).await.unwrap();
    assert_eq!(saved, out.path().join("UT Download 2024-10-19.csv.gz"));
    assert_eq!(std::fs::read(&saved).unwrap(), vec![0x1f, 0x8b, 0x08]);
}

#[test(tokio::test)]
async fn test_download_failure_stops_polling() {
    logging::init_test_logging();
    let server = MockServer::start().await;
    let logs = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/data_downloader/data_downloader_download/7/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "msg": "Download expired" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ClearGuideClient::new(&test_data::test_config(&server.uri(), logs.path()))
        .unwrap()
        .with_polling(Duration::from_millis(1), 5);

    let err = client.download(7, "expired", out.path()).await.unwrap_err();
    assert!(err.to_string().contains("Download expired"));
}
