use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use beckn_bap::models::{Action, Context, Envelope};
use beckn_bap::services::bpp::http::HttpBppClient;
use beckn_bap::services::bpp::{BppClient, BppError};

// ── Fake BPP server ──

async fn fake_bpp() -> String {
    let app = Router::new()
        .route(
            "/confirm",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "context": body["context"],
                    "message": { "order": { "bpp_booking_id": "FLT-9" } }
                }))
            }),
        )
        .route(
            "/cancel",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": { "code": "40001", "message": "Booking already cancelled" } })),
                )
            }),
        )
        .route(
            "/init",
            post(|| async { Json(json!({ "error": { "message": "item out of stock" } })) }),
        )
        .route(
            "/status",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({}))
            }),
        )
        .route("/search", post(|| async { "not json" }))
        .route("/track", post(|| async { StatusCode::SERVICE_UNAVAILABLE }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn envelope(action: Action) -> Envelope {
    Envelope {
        context: Context {
            domain: "mobility".to_string(),
            country: "IND".to_string(),
            city: "std:080".to_string(),
            action: action.as_str().to_string(),
            core_version: "1.1.0".to_string(),
            bap_id: "test-bap".to_string(),
            bap_uri: "http://bap.test".to_string(),
            bpp_id: None,
            bpp_uri: None,
            transaction_id: "txn-1".to_string(),
            message_id: "msg-1".to_string(),
            timestamp: Utc::now(),
            ttl: None,
        },
        message: json!({ "order": { "id": "BK001" } }),
    }
}

fn client() -> HttpBppClient {
    HttpBppClient::new(Duration::from_millis(300)).unwrap()
}

#[tokio::test]
async fn test_success_returns_body() {
    let base = fake_bpp().await;
    let body = client()
        .call(&format!("{base}/"), Action::Confirm, &envelope(Action::Confirm))
        .await
        .unwrap();

    assert_eq!(body["message"]["order"]["bpp_booking_id"], "FLT-9");
    assert_eq!(body["context"]["transaction_id"], "txn-1");
}

#[tokio::test]
async fn test_error_status_is_rejected_with_bpp_message() {
    let base = fake_bpp().await;
    let err = client()
        .call(&base, Action::Cancel, &envelope(Action::Cancel))
        .await
        .unwrap_err();

    assert!(matches!(err, BppError::Rejected { status: 400, .. }));
    assert!(err.is_already_cancelled());
    assert!(!err.is_unavailable());
}

#[tokio::test]
async fn test_error_in_ok_body_is_rejected() {
    let base = fake_bpp().await;
    let err = client()
        .call(&base, Action::Init, &envelope(Action::Init))
        .await
        .unwrap_err();

    match err {
        BppError::Rejected { status, message, .. } => {
            assert_eq!(status, 200);
            assert_eq!(message, "item out of stock");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_bpp_times_out() {
    let base = fake_bpp().await;
    let err = client()
        .call(&base, Action::Status, &envelope(Action::Status))
        .await
        .unwrap_err();

    assert!(matches!(err, BppError::Timeout { .. }));
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_gateway_error_is_unreachable() {
    let base = fake_bpp().await;
    let err = client()
        .call(&base, Action::Track, &envelope(Action::Track))
        .await
        .unwrap_err();

    assert!(matches!(err, BppError::Unreachable { .. }));
}

#[tokio::test]
async fn test_non_json_body_is_invalid() {
    let base = fake_bpp().await;
    let err = client()
        .call(&base, Action::Search, &envelope(Action::Search))
        .await
        .unwrap_err();

    assert!(matches!(err, BppError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_closed_port_is_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client()
        .call(&format!("http://{addr}"), Action::Search, &envelope(Action::Search))
        .await
        .unwrap_err();

    assert!(err.is_unavailable());
}
