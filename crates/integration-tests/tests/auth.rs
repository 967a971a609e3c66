//! Authentication and authorization over HTTP.

use axum::http::{Method, StatusCode};
use serde_json::json;

use workorder_api::services::PipelineSettings;
use workorder_integration_tests::{ADMIN_TOKEN, NEWCOMER_TOKEN, TestApp, WORKER_TOKEN};

#[tokio::test]
async fn test_health_needs_no_credential() {
    let app = TestApp::new().await;

    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("ok"));

    let (status, _) = app.call(Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_reports_degraded_sms_channel() {
    let app = TestApp::builder()
        .settings(PipelineSettings {
            degraded_after: 1,
            ..PipelineSettings::default()
        })
        .build()
        .await;
    let id = app
        .create_work_order(json!({ "title": "Fix sink", "description": "Leaking" }))
        .await;

    let (_, body) = app.call(Method::GET, "/health/ready", None, None).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["channels"]["sms"]["configured"], true);
    assert_eq!(body["channels"]["sms"]["degraded"], false);
    assert_eq!(body["channels"]["order_sync"]["configured"], false);

    app.channel.fail();
    let (status, _) = app
        .post(
            "/api/notifications",
            ADMIN_TOKEN,
            json!({ "work_order_id": id, "message": "Parts arrived" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, body) = app.call(Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channels"]["sms"]["degraded"], true);
    assert_eq!(body["channels"]["sms"]["consecutive_failures"], 1);
    assert_eq!(body["realtime_connections"], 0);
}

#[tokio::test]
async fn test_missing_credential_is_401() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(Method::GET, "/api/work-orders", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Access token required");
}

#[tokio::test]
async fn test_invalid_credential_is_403() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/work-orders", "forged").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn test_verified_but_unknown_user_is_403() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/api/auth/me", NEWCOMER_TOKEN).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_worker_cannot_create_work_orders() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/work-orders",
            WORKER_TOKEN,
            json!({ "title": "Fix sink", "description": "Leaking" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Insufficient permissions");
    assert_eq!(app.store.log_count().await, 0);
}

#[tokio::test]
async fn test_me_returns_the_caller() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/auth/me", ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], app.admin.id.to_string());
    assert_eq!(body["role"], "admin");
    assert!(body.get("firebase_uid").is_none());
}

#[tokio::test]
async fn test_first_login_creates_a_worker() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "idToken": NEWCOMER_TOKEN })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "worker");
    assert_eq!(body["user"]["name"], "jane.smith");
    assert_eq!(body["user"]["email"], "jane.smith@workorderwizard.com");
    let first_id = body["user"]["id"].clone();

    // The new user can now use the API, and logging in again finds them.
    let (status, _) = app.get("/api/auth/me", NEWCOMER_TOKEN).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "id_token": NEWCOMER_TOKEN })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], first_id);
}

#[tokio::test]
async fn test_login_keeps_existing_role() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "id_token": ADMIN_TOKEN })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "admin");
}

#[tokio::test]
async fn test_login_rejections() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "id_token": "forged" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");

    let (status, _) = app
        .call(Method::POST, "/api/auth/login", None, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_websocket_requires_credential() {
    let app = TestApp::new().await;

    let (status, _) = app.call(Method::GET, "/ws", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call(Method::GET, "/ws?token=forged", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let app = TestApp::new().await;
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "edge-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "edge-42");
}
