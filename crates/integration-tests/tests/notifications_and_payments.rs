//! Manual notifications and payment records over HTTP.

use axum::http::StatusCode;
use serde_json::json;

use workorder_core::WorkOrderId;
use workorder_integration_tests::{ADMIN_TOKEN, TestApp, WORKER_TOKEN};

async fn app_with_work_order() -> (TestApp, String) {
    let app = TestApp::new().await;
    let id = app
        .create_work_order(json!({ "title": "Fix sink", "description": "Leaking" }))
        .await;
    (app, id)
}

#[tokio::test]
async fn test_manual_notification_is_sent_verbatim_and_logged() {
    let (app, id) = app_with_work_order().await;

    let (status, body) = app
        .post(
            "/api/notifications",
            WORKER_TOKEN,
            json!({ "work_order_id": id, "message": "On my way", "phone_number": "+15550001111" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["phone_number"], "+15550001111");
    assert!(body["message_sid"].as_str().unwrap().starts_with("SM"));

    let sent = app.channel.sent().await;
    assert_eq!(
        sent,
        vec![("+15550001111".to_string(), "On my way".to_string())]
    );

    let (_, logs) = app
        .get(&format!("/api/work-orders/{id}/logs"), WORKER_TOKEN)
        .await;
    let last = logs.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["action"], "notification_sent");
    assert_eq!(last["details"], "SMS sent to +15550001111: On my way");
}

#[tokio::test]
async fn test_manual_notification_defaults_destination() {
    let (app, id) = app_with_work_order().await;

    let (status, body) = app
        .post(
            "/api/notifications",
            ADMIN_TOKEN,
            json!({ "work_order_id": id, "message": "Parts arrived" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone_number"], "+13202677242");
}

#[tokio::test]
async fn test_manual_notification_failure_is_502_and_not_logged() {
    let (app, id) = app_with_work_order().await;
    app.channel.fail();

    let (status, body) = app
        .post(
            "/api/notifications",
            ADMIN_TOKEN,
            json!({ "work_order_id": id, "message": "Parts arrived" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Failed to send notification");
    assert_eq!(app.store.log_count().await, 1);
}

#[tokio::test]
async fn test_manual_notification_unknown_work_order() {
    let app = TestApp::new().await;

    let (status, _) = app
        .post(
            "/api/notifications",
            ADMIN_TOKEN,
            json!({ "work_order_id": WorkOrderId::random(), "message": "Hello" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.channel.sent().await.is_empty());
}

#[tokio::test]
async fn test_manual_notification_requires_message() {
    let (app, id) = app_with_work_order().await;

    let (status, _) = app
        .post(
            "/api/notifications",
            ADMIN_TOKEN,
            json!({ "work_order_id": id, "message": "  " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_record_and_list_payments() {
    let (app, id) = app_with_work_order().await;

    let (status, body) = app
        .post(
            "/api/payments",
            ADMIN_TOKEN,
            json!({ "work_order_id": id, "amount": "250.00", "payment_reference": "pi_1234567890abcdef" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["amount"], "250.00");
    assert_eq!(body["work_order_id"], id);

    let (status, body) = app
        .get(&format!("/api/work-orders/{id}/payments"), WORKER_TOKEN)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["payment_reference"], "pi_1234567890abcdef");
}

#[tokio::test]
async fn test_payment_rejections() {
    let (app, id) = app_with_work_order().await;

    let (status, _) = app
        .post(
            "/api/payments",
            ADMIN_TOKEN,
            json!({ "work_order_id": id, "amount": "0" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/payments",
            ADMIN_TOKEN,
            json!({ "work_order_id": id, "amount": "10.005" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/payments",
            ADMIN_TOKEN,
            json!({ "work_order_id": WorkOrderId::random(), "amount": "10.00" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .get(
            &format!("/api/work-orders/{}/payments", WorkOrderId::random()),
            ADMIN_TOKEN,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
