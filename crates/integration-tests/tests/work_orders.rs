//! Work order create/update pipeline over HTTP.

use serde_json::json;

use axum::http::StatusCode;
use workorder_api::services::{PipelineSettings, Session, Topic};
use workorder_core::{TransitionPolicy, WorkOrderId};
use workorder_integration_tests::{ADMIN_TOKEN, TestApp, WORKER_TOKEN};

#[tokio::test]
async fn test_create_always_starts_open() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/work-orders",
            ADMIN_TOKEN,
            json!({ "title": "Fix sink", "description": "Leaking", "status": "completed" }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "open");
    assert_eq!(body["title"], "Fix sink");
    assert_eq!(body["side_effects"]["notification"]["outcome"], "skipped");
    assert_eq!(body["side_effects"]["order_sync"]["outcome"], "skipped");

    let id = body["id"].as_str().unwrap();
    let (status, logs) = app
        .get(&format!("/api/work-orders/{id}/logs"), WORKER_TOKEN)
        .await;
    assert_eq!(status, StatusCode::OK);
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["action"], "created");
    assert!(app.channel.sent().await.is_empty());
}

#[tokio::test]
async fn test_status_update_logs_and_notifies_once() {
    let app = TestApp::new().await;
    let id = app
        .create_work_order(json!({ "title": "Fix sink", "description": "Leaking" }))
        .await;

    let (status, body) = app
        .patch(
            &format!("/api/work-orders/{id}"),
            WORKER_TOKEN,
            json!({ "status": "in_progress" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["side_effects"]["notification"]["outcome"], "delivered");

    let (_, logs) = app
        .get(&format!("/api/work-orders/{id}/logs"), WORKER_TOKEN)
        .await;
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[1]["action"], "updated");
    assert!(
        logs[1]["details"]
            .as_str()
            .unwrap()
            .contains("status: open → in_progress")
    );

    let sent = app.channel.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+13202677242");
    assert!(sent[0].1.contains("status changed to in_progress"));
}

#[tokio::test]
async fn test_same_status_update_logs_without_notifying() {
    let app = TestApp::new().await;
    let id = app
        .create_work_order(json!({ "title": "Fix sink", "description": "Leaking" }))
        .await;

    let (status, body) = app
        .patch(
            &format!("/api/work-orders/{id}"),
            ADMIN_TOKEN,
            json!({ "status": "open" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["side_effects"]["notification"]["outcome"], "skipped");
    assert_eq!(app.store.log_count().await, 2);
    assert!(app.channel.sent().await.is_empty());
}

#[tokio::test]
async fn test_failing_channel_does_not_block_creation() {
    let app = TestApp::new().await;
    app.channel.fail();

    let (status, body) = app
        .post(
            "/api/work-orders",
            ADMIN_TOKEN,
            json!({
                "title": "Fix HVAC System",
                "description": "Temperature control is not working",
                "assigned_user_id": app.worker.id.to_string(),
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["assigned_user_id"], app.worker.id.to_string());
    assert_eq!(body["side_effects"]["notification"]["outcome"], "failed");
    assert_eq!(app.store.log_count().await, 1);
}

#[tokio::test]
async fn test_unconfigured_channel_is_skipped() {
    let app = TestApp::builder().without_channel().build().await;

    let (status, body) = app
        .post(
            "/api/work-orders",
            ADMIN_TOKEN,
            json!({
                "title": "Fix HVAC System",
                "description": "Temperature control is not working",
                "assigned_user_id": app.worker.id.to_string(),
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["side_effects"]["notification"]["outcome"], "skipped");
}

#[tokio::test]
async fn test_order_sync_appends_log_entry() {
    let app = TestApp::builder().with_order_sync().build().await;

    let (status, body) = app
        .post(
            "/api/work-orders",
            ADMIN_TOKEN,
            json!({
                "title": "Plumbing Repair",
                "description": "Leaky faucet in the break room",
                "shopify_order_id": "1001",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["side_effects"]["order_sync"]["outcome"], "delivered");
    assert_eq!(body["side_effects"]["order_sync"]["reference"], "#1001");

    let id = body["id"].as_str().unwrap();
    let (_, logs) = app
        .get(&format!("/api/work-orders/{id}/logs"), ADMIN_TOKEN)
        .await;
    let actions: Vec<_> = logs
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["action"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(actions, ["created", "shopify_synced"]);
}

#[tokio::test]
async fn test_update_unknown_work_order_is_404() {
    let app = TestApp::new().await;

    let (status, body) = app
        .patch(
            &format!("/api/work-orders/{}", WorkOrderId::random()),
            ADMIN_TOKEN,
            json!({ "status": "completed" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Work order not found");
    assert_eq!(app.store.log_count().await, 0);
    assert!(app.channel.sent().await.is_empty());

    let (status, _) = app
        .patch("/api/work-orders/not-a-uuid", ADMIN_TOKEN, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_input_is_400_and_writes_nothing() {
    let app = TestApp::new().await;

    let (status, _) = app
        .post(
            "/api/work-orders",
            ADMIN_TOKEN,
            json!({ "title": "   ", "description": "Leaking" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post("/api/work-orders", ADMIN_TOKEN, json!({ "title": "Fix sink" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid input data");

    let (status, _) = app
        .post(
            "/api/work-orders",
            ADMIN_TOKEN,
            json!({
                "title": "Fix sink",
                "description": "Leaking",
                "assigned_user_id": WorkOrderId::random().to_string(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.log_count().await, 0);

    let id = app
        .create_work_order(json!({ "title": "Fix sink", "description": "Leaking" }))
        .await;
    let (status, _) = app
        .patch(
            &format!("/api/work-orders/{id}"),
            ADMIN_TOKEN,
            json!({ "status": "archived" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.log_count().await, 1);
}

#[tokio::test]
async fn test_forward_policy_refuses_reopening() {
    let settings = PipelineSettings {
        transition_policy: TransitionPolicy::Forward,
        ..PipelineSettings::default()
    };
    let app = TestApp::builder().settings(settings).build().await;
    let id = app
        .create_work_order(json!({ "title": "Fix sink", "description": "Leaking" }))
        .await;
    let uri = format!("/api/work-orders/{id}");

    let (status, _) = app
        .patch(&uri, ADMIN_TOKEN, json!({ "status": "completed" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .patch(&uri, ADMIN_TOKEN, json!({ "status": "open" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "cannot change status from completed to open");
    assert_eq!(app.store.log_count().await, 2);
}

#[tokio::test]
async fn test_list_filters_and_paginates() {
    let app = TestApp::new().await;
    for title in ["First", "Second", "Third"] {
        app.create_work_order(json!({
            "title": title,
            "description": "Routine check",
            "assigned_user_id": app.worker.id.to_string(),
        }))
        .await;
    }
    let open_id = app
        .create_work_order(json!({ "title": "Unassigned", "description": "Nobody yet" }))
        .await;
    app.patch(
        &format!("/api/work-orders/{open_id}"),
        ADMIN_TOKEN,
        json!({ "status": "completed" }),
    )
    .await;

    let (status, body) = app.get("/api/work-orders?limit=2", ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["work_orders"].as_array().unwrap().len(), 2);
    assert_eq!(
        body["pagination"],
        json!({ "page": 1, "limit": 2, "total": 4, "pages": 2 })
    );
    // Newest first.
    assert_eq!(body["work_orders"][0]["title"], "Unassigned");
    assert_eq!(body["work_orders"][0]["logs"][0]["action"], "updated");

    let (_, body) = app
        .get(
            &format!(
                "/api/work-orders?assigned_user_id={}&status=open",
                app.worker.id
            ),
            WORKER_TOKEN,
        )
        .await;
    let items = body["work_orders"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert!(
        items
            .iter()
            .all(|w| w["assigned_user"]["name"] == "John Worker")
    );

    let (status, _) = app
        .get("/api/work-orders?status=archived", ADMIN_TOKEN)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_detail_shows_logs_newest_first() {
    let app = TestApp::new().await;
    let id = app
        .create_work_order(json!({
            "title": "Fix sink",
            "description": "Leaking",
            "assigned_user_id": app.worker.id.to_string(),
        }))
        .await;
    app.patch(
        &format!("/api/work-orders/{id}"),
        ADMIN_TOKEN,
        json!({ "description": "Leaking badly" }),
    )
    .await;

    let (status, body) = app
        .get(&format!("/api/work-orders/{id}"), WORKER_TOKEN)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "Leaking badly");
    assert_eq!(body["assigned_user"]["id"], app.worker.id.to_string());
    assert_eq!(body["logs"][0]["action"], "updated");
    assert_eq!(body["logs"][1]["action"], "created");

    let (status, _) = app
        .get(
            &format!("/api/work-orders/{}", WorkOrderId::random()),
            WORKER_TOKEN,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mutations_reach_realtime_subscribers() {
    let app = TestApp::new().await;
    let id = app
        .create_work_order(json!({ "title": "Fix sink", "description": "Leaking" }))
        .await;
    let work_order_id: WorkOrderId = id.parse().unwrap();
    let other = WorkOrderId::random();

    let broadcaster = app.state.broadcaster();
    let (watcher, mut watcher_rx) = broadcaster
        .connect(Session {
            user_id: app.admin.id,
            role: app.admin.role,
        })
        .await;
    broadcaster.join(watcher, work_order_id).await;
    let (bystander, mut bystander_rx) = broadcaster
        .connect(Session {
            user_id: app.worker.id,
            role: app.worker.role,
        })
        .await;
    broadcaster.join(bystander, other).await;

    let (status, body) = app
        .patch(
            &format!("/api/work-orders/{id}"),
            ADMIN_TOKEN,
            json!({ "assigned_user_id": app.worker.id.to_string() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["side_effects"]["broadcast_recipients"], 2);

    let event = watcher_rx.try_recv().unwrap();
    assert_eq!(event.event, "work-order-updated");
    assert_eq!(event.data["work_order_id"], id);

    // The bystander only hears about the assignment addressed to them.
    let event = bystander_rx.try_recv().unwrap();
    assert_eq!(event.event, "notification");
    assert!(bystander_rx.try_recv().is_err());
    assert_eq!(
        broadcaster.subscriber_count(Topic::WorkOrder(other)).await,
        1
    );
}
