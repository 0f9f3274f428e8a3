use std::time::Duration;

use acr_oracle::{AccrualOracle, HttpAccrualOracle, OracleError};
use acr_schemas::{Micros, OracleStatus, OrderNumber};
use httpmock::prelude::*;
use serde_json::json;

fn order(s: &str) -> OrderNumber {
    OrderNumber::parse(s).unwrap()
}

fn oracle_for(server: &MockServer) -> HttpAccrualOracle {
    HttpAccrualOracle::new(&server.base_url(), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn processed_answer_is_decoded_to_micros() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/orders/100");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"order": "100", "status": "PROCESSED", "accrual": 729.98}));
        })
        .await;

    let r = oracle_for(&server).fetch_status(&order("100")).await.unwrap();
    m.assert_async().await;
    assert_eq!(r.status, OracleStatus::Processed);
    assert_eq!(r.accrual, Some(Micros::new(729_980_000)));
}

#[tokio::test]
async fn no_content_means_not_registered() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/orders/5");
            then.status(204);
        })
        .await;

    let r = oracle_for(&server).fetch_status(&order("5")).await.unwrap();
    assert_eq!(r.status, OracleStatus::NotRegistered);
    assert_eq!(r.accrual, None);
}

#[tokio::test]
async fn too_many_requests_carries_retry_after() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/orders/5");
            then.status(429)
                .header("Retry-After", "60")
                .body("No more than N requests per minute allowed");
        })
        .await;

    let err = oracle_for(&server).fetch_status(&order("5")).await.unwrap_err();
    assert_eq!(
        err,
        OracleError::RateLimited {
            retry_after: Some(Duration::from_secs(60))
        }
    );
}

#[tokio::test]
async fn server_error_is_a_status_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/orders/300");
            then.status(500).body("internal");
        })
        .await;

    let err = oracle_for(&server).fetch_status(&order("300")).await.unwrap_err();
    assert_eq!(
        err,
        OracleError::Status {
            code: 500,
            body: "internal".to_string()
        }
    );
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/orders/9");
            then.status(200).body("{not json");
        })
        .await;

    let err = oracle_for(&server).fetch_status(&order("9")).await.unwrap_err();
    assert!(matches!(err, OracleError::Decode(_)), "{err}");
}

#[tokio::test]
async fn slow_service_is_a_transport_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/orders/9");
            then.status(200)
                .delay(Duration::from_millis(800))
                .json_body(json!({"order": "9", "status": "PROCESSED", "accrual": 1}));
        })
        .await;

    let oracle = HttpAccrualOracle::new(&server.base_url(), Duration::from_millis(100)).unwrap();
    let err = oracle.fetch_status(&order("9")).await.unwrap_err();
    assert!(matches!(err, OracleError::Transport(_)), "{err}");
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    // Port 9 (discard) on loopback: nothing listens there in CI.
    let oracle = HttpAccrualOracle::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
    let err = oracle.fetch_status(&order("1")).await.unwrap_err();
    assert!(matches!(err, OracleError::Transport(_)), "{err}");
}
