//! Tests for the event log file source client.

use std::path::PathBuf;

use serde_json::json;
use sfstream::config::Config;
use sfstream::sf_logs::{SfLogClient, SourceError};
use sfstream::types::LogFileDescriptor;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(host: String) -> Config {
    Config {
        host,
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        api_version: "v61.0".to_string(),
        cor_api_key: "cor-key".to_string(),
        cor_endpoint: "http://unused.invalid".to_string(),
        watermark_path: PathBuf::from("/tmp/watermark.json"),
        log_interval: "Hourly".to_string(),
        max_in_flight: 4,
        http_timeout_secs: 5,
        backoff_base_ms: 1,
        backoff_max_ms: 10,
        run_interval_secs: 0,
        insecure_tls: false,
    }
}

fn descriptor_json(id: &str, log_file: &str) -> serde_json::Value {
    json!({
        "Id": id,
        "EventType": "API",
        "Interval": "Hourly",
        "LogDate": "2024-05-20T01:00:00.000+0000",
        "LogFile": log_file
    })
}

#[tokio::test]
async fn listing_builds_expected_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/data/v61.0/query/"))
        .and(query_param(
            "q",
            "SELECT Id, EventType, Interval, LogDate, LogFile FROM EventLogFile \
             WHERE Interval = 'Hourly' AND LogDate >= 2024-05-20T00:00:00Z",
        ))
        .and(header("Authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [descriptor_json("0AT1", "/services/data/v61.0/sobjects/EventLogFile/0AT1/LogFile")],
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SfLogClient::new(&test_config(server.uri())).unwrap();
    let files = client
        .list_files_since("tok-123", "2024-05-20T00:00:00Z")
        .await
        .unwrap();

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, "0AT1");
    assert_eq!(files[0].event_type, "API");
    assert_eq!(files[0].interval, "Hourly");
    assert_eq!(
        files[0].log_file,
        "/services/data/v61.0/sobjects/EventLogFile/0AT1/LogFile"
    );
}

#[tokio::test]
async fn listing_follows_pagination() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/data/v61.0/query/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [descriptor_json("0AT1", "/files/1")],
            "done": false,
            "nextRecordsUrl": "/services/data/v61.0/query/01g000-2000"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services/data/v61.0/query/01g000-2000"))
        .and(header("Authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [descriptor_json("0AT2", "/files/2")],
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SfLogClient::new(&test_config(server.uri())).unwrap();
    let files = client
        .list_files_since("tok-123", "2024-05-20T00:00:00Z")
        .await
        .unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].id, "0AT1");
    assert_eq!(files[1].id, "0AT2");
}

#[tokio::test]
async fn listing_failure_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/data/v61.0/query/"))
        .respond_with(ResponseTemplate::new(403).set_body_string("INVALID_SESSION_ID"))
        .mount(&server)
        .await;

    let client = SfLogClient::new(&test_config(server.uri())).unwrap();
    let err = client
        .list_files_since("tok-123", "2024-05-20T00:00:00Z")
        .await
        .unwrap_err();

    match err {
        SourceError::Status { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("INVALID_SESSION_ID"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn listing_retries_transient_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/data/v61.0/query/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services/data/v61.0/query/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [],
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SfLogClient::new(&test_config(server.uri())).unwrap();
    let files = client
        .list_files_since("tok-123", "2024-05-20T00:00:00Z")
        .await
        .unwrap();

    assert!(files.is_empty());
}

#[tokio::test]
async fn fetch_file_returns_raw_body() {
    let server = MockServer::start().await;

    let csv = "TIMESTAMP_DERIVED,USER_ID\n2024-05-20T01:00:00.000000Z,42\n";
    Mock::given(method("GET"))
        .and(path("/services/data/v61.0/sobjects/EventLogFile/0AT1/LogFile"))
        .and(header("Authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(csv))
        .expect(1)
        .mount(&server)
        .await;

    let client = SfLogClient::new(&test_config(server.uri())).unwrap();
    let descriptor = LogFileDescriptor {
        id: "0AT1".to_string(),
        event_type: "API".to_string(),
        interval: "Hourly".to_string(),
        log_date: "2024-05-20T01:00:00.000+0000".to_string(),
        log_file: "/services/data/v61.0/sobjects/EventLogFile/0AT1/LogFile".to_string(),
    };

    let body = client.fetch_file("tok-123", &descriptor).await.unwrap();
    assert_eq!(body, csv);
}

#[tokio::test]
async fn fetch_file_missing_is_a_status_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let client = SfLogClient::new(&test_config(server.uri())).unwrap();
    let descriptor = LogFileDescriptor {
        id: "0AT9".to_string(),
        event_type: "API".to_string(),
        interval: "Hourly".to_string(),
        log_date: "2024-05-20T01:00:00.000+0000".to_string(),
        log_file: "/files/gone".to_string(),
    };

    let err = client.fetch_file("tok-123", &descriptor).await.unwrap_err();
    match err {
        SourceError::Status { status, .. } => assert_eq!(status, 404),
        other => panic!("expected status error, got {other:?}"),
    }
}
