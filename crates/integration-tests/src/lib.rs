//! In-process test harness for the WorkOrderWizard API.
//!
//! [`TestApp`] builds the real router over [`MemoryStore`] with fake
//! collaborators, so tests exercise routing, auth, the mutation pipeline and
//! error mapping without a database or network.
//!
//! Two users are seeded: an admin (token [`ADMIN_TOKEN`]) and a worker
//! (token [`WORKER_TOKEN`]). Any other token is rejected by the verifier.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p workorder-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::ServiceExt; // oneshot

use workorder_api::db::{MemoryStore, UserStore};
use workorder_api::integrations::{
    AuthError, DeliveryError, NotificationChannel, OrderSync, SyncedOrder, TokenVerifier,
    VerifiedIdentity,
};
use workorder_api::models::{NewUser, User};
use workorder_api::routes;
use workorder_api::services::PipelineSettings;
use workorder_api::state::{AppState, Collaborators};
use workorder_core::{Email, UserRole, WorkOrderId};

pub const ADMIN_TOKEN: &str = "admin-token";
pub const WORKER_TOKEN: &str = "worker-token";
/// Verifies, but no user is linked to its subject until it logs in.
pub const NEWCOMER_TOKEN: &str = "newcomer-token";

/// Verifier backed by a fixed token table.
#[derive(Debug, Default)]
pub struct StaticVerifier {
    identities: HashMap<String, VerifiedIdentity>,
}

impl StaticVerifier {
    pub fn insert(&mut self, token: &str, subject: &str, email: &str, name: Option<&str>) {
        self.identities.insert(
            token.to_string(),
            VerifiedIdentity {
                subject: subject.to_string(),
                email: Some(Email::parse(email).unwrap()),
                name: name.map(str::to_string),
            },
        );
    }
}

#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        self.identities.get(token).cloned().ok_or(AuthError::Invalid)
    }
}

/// SMS channel that records what it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingChannel {
    /// Make every later send fail with a provider rejection.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// `(destination, body)` pairs, oldest first.
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, to: &str, body: &str) -> Result<String, DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected("21211 invalid 'To' number".to_string()));
        }
        let mut sent = self.sent.lock().await;
        sent.push((to.to_string(), body.to_string()));
        Ok(format!("SM{:032}", sent.len()))
    }
}

/// Order sync that knows every order as `#<ref>`.
#[derive(Debug, Default)]
pub struct EchoOrderSync;

#[async_trait]
impl OrderSync for EchoOrderSync {
    async fn sync(
        &self,
        _work_order_id: WorkOrderId,
        order_ref: &str,
    ) -> Result<SyncedOrder, DeliveryError> {
        Ok(SyncedOrder {
            order_ref: order_ref.to_string(),
            name: Some(format!("#{order_ref}")),
            financial_status: Some("paid".to_string()),
        })
    }
}

/// A router over the in-memory store with fakes behind every seam.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub channel: Arc<RecordingChannel>,
    pub admin: User,
    pub worker: User,
}

/// Test app configuration.
#[derive(Debug, Default)]
pub struct TestAppBuilder {
    without_channel: bool,
    with_order_sync: bool,
    settings: PipelineSettings,
}

impl TestAppBuilder {
    /// Leave SMS unconfigured.
    #[must_use]
    pub const fn without_channel(mut self) -> Self {
        self.without_channel = true;
        self
    }

    /// Wire up [`EchoOrderSync`].
    #[must_use]
    pub const fn with_order_sync(mut self) -> Self {
        self.with_order_sync = true;
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub async fn build(self) -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let channel = Arc::new(RecordingChannel::default());

        let admin = seed_user(
            &store,
            "Admin User",
            "admin@workorderwizard.com",
            UserRole::Admin,
            "admin-uid",
        )
        .await;
        let worker = seed_user(
            &store,
            "John Worker",
            "john@workorderwizard.com",
            UserRole::Worker,
            "worker-uid",
        )
        .await;

        let mut verifier = StaticVerifier::default();
        verifier.insert(
            ADMIN_TOKEN,
            "admin-uid",
            "admin@workorderwizard.com",
            Some("Admin User"),
        );
        verifier.insert(
            WORKER_TOKEN,
            "worker-uid",
            "john@workorderwizard.com",
            Some("John Worker"),
        );
        verifier.insert(
            NEWCOMER_TOKEN,
            "newcomer-uid",
            "jane.smith@workorderwizard.com",
            None,
        );

        let collaborators = Collaborators {
            work_orders: store.clone(),
            users: store.clone(),
            audit: store.clone(),
            payments: store.clone(),
            channel: (!self.without_channel)
                .then(|| Arc::clone(&channel) as Arc<dyn NotificationChannel>),
            order_sync: self
                .with_order_sync
                .then(|| Arc::new(EchoOrderSync) as Arc<dyn OrderSync>),
            verifier: Arc::new(verifier),
        };

        let state = AppState::new(collaborators, self.settings);
        TestApp {
            router: routes::router(state.clone()),
            state,
            store,
            channel,
            admin,
            worker,
        }
    }
}

async fn seed_user(
    store: &MemoryStore,
    name: &str,
    email: &str,
    role: UserRole,
    firebase_uid: &str,
) -> User {
    UserStore::create(
        store,
        &NewUser {
            name: name.to_string(),
            email: Email::parse(email).unwrap(),
            role,
            firebase_uid: firebase_uid.to_string(),
        },
    )
    .await
    .unwrap()
}

impl TestApp {
    /// Default app: SMS configured, order sync not.
    pub async fn new() -> Self {
        Self::builder().build().await
    }

    #[must_use]
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::default()
    }

    /// Send one request. `body` is sent as JSON when present.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PATCH, uri, Some(token), Some(body)).await
    }

    /// Create a work order as the admin and return its id.
    pub async fn create_work_order(&self, body: Value) -> String {
        let (status, json) = self.post("/api/work-orders", ADMIN_TOKEN, body).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {json}");
        json["id"].as_str().unwrap().to_string()
    }
}
