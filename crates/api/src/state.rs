//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::db::{AuditLog, PaymentStore, PgStore, UserStore, WorkOrderStore};
use crate::integrations::{
    FirebaseVerifier, NotificationChannel, OrderSync, ShopifyOrderSync, TokenVerifier,
    TwilioClient,
};
use crate::services::{Broadcaster, NotificationDispatcher, PipelineSettings, WorkOrderService};

/// Everything the API talks to, as trait objects.
///
/// `main` fills this with the `PostgreSQL` store and real HTTP clients;
/// tests fill it with the in-memory store and fakes.
#[derive(Clone)]
pub struct Collaborators {
    pub work_orders: Arc<dyn WorkOrderStore>,
    pub users: Arc<dyn UserStore>,
    pub audit: Arc<dyn AuditLog>,
    pub payments: Arc<dyn PaymentStore>,
    /// `None` when SMS is not configured.
    pub channel: Option<Arc<dyn NotificationChannel>>,
    /// `None` when order sync is not configured.
    pub order_sync: Option<Arc<dyn OrderSync>>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl Collaborators {
    /// Wire the `PostgreSQL` store and the clients enabled in `config`.
    #[must_use]
    pub fn production(config: &ApiConfig, pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        let channel = config
            .twilio
            .as_ref()
            .map(|c| Arc::new(TwilioClient::new(c)) as Arc<dyn NotificationChannel>);
        let order_sync = config
            .shopify
            .as_ref()
            .map(|c| Arc::new(ShopifyOrderSync::new(c)) as Arc<dyn OrderSync>);

        Self {
            work_orders: store.clone(),
            users: store.clone(),
            audit: store.clone(),
            payments: store,
            channel,
            order_sync,
            verifier: Arc::new(FirebaseVerifier::new(&config.firebase)),
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the stores, the mutation pipeline and the realtime broadcaster.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    work_orders: Arc<dyn WorkOrderStore>,
    users: Arc<dyn UserStore>,
    audit: Arc<dyn AuditLog>,
    payments: Arc<dyn PaymentStore>,
    verifier: Arc<dyn TokenVerifier>,
    dispatcher: Arc<NotificationDispatcher>,
    broadcaster: Arc<Broadcaster>,
    service: WorkOrderService,
}

impl AppState {
    /// Build the state and the service graph from its collaborators.
    #[must_use]
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
        let Collaborators {
            work_orders,
            users,
            audit,
            payments,
            channel,
            order_sync,
            verifier,
        } = collaborators;

        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::clone(&work_orders),
            channel,
            settings.side_effect_timeout,
            settings.degraded_after,
        ));
        let broadcaster = Arc::new(Broadcaster::default());
        let service = WorkOrderService::new(
            Arc::clone(&work_orders),
            Arc::clone(&users),
            Arc::clone(&audit),
            Arc::clone(&dispatcher),
            order_sync,
            Arc::clone(&broadcaster),
            settings,
        );

        Self {
            inner: Arc::new(AppStateInner {
                work_orders,
                users,
                audit,
                payments,
                verifier,
                dispatcher,
                broadcaster,
                service,
            }),
        }
    }

    #[must_use]
    pub fn work_orders(&self) -> &dyn WorkOrderStore {
        self.inner.work_orders.as_ref()
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.inner.users.as_ref()
    }

    #[must_use]
    pub fn audit(&self) -> &dyn AuditLog {
        self.inner.audit.as_ref()
    }

    #[must_use]
    pub fn payments(&self) -> &dyn PaymentStore {
        self.inner.payments.as_ref()
    }

    #[must_use]
    pub fn verifier(&self) -> &dyn TokenVerifier {
        self.inner.verifier.as_ref()
    }

    /// Direct access to SMS delivery for the manual notification endpoint.
    #[must_use]
    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.inner.dispatcher
    }

    #[must_use]
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.inner.broadcaster
    }

    /// The create/update pipeline.
    #[must_use]
    pub fn work_order_service(&self) -> &WorkOrderService {
        &self.inner.service
    }
}
