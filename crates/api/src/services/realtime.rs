//! Realtime fan-out to WebSocket subscribers.
//!
//! The [`Broadcaster`] owns a topic registry: each subscriber has a bounded
//! queue and a set of topics, and each topic a set of subscribers. Delivery
//! is at-most-once with no replay. A subscriber whose queue is full or
//! closed misses the event; publishing never waits.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, trace};

use workorder_core::{UserId, UserRole, WorkOrderId};

/// Per-subscriber queue depth.
const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// A named broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    WorkOrder(WorkOrderId),
    User(UserId),
    Role(UserRole),
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkOrder(id) => write!(f, "work-order:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
            Self::Role(role) => write!(f, "role:{role}"),
        }
    }
}

/// One message as written to the socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub event: &'static str,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    #[must_use]
    pub fn new(event: &'static str, data: Value) -> Self {
        Self {
            event,
            data,
            timestamp: Utc::now(),
        }
    }

    /// A work order changed; sent to its `work-order:<id>` topic.
    #[must_use]
    pub fn work_order_updated(work_order_id: WorkOrderId, update: Value) -> Self {
        Self::new(
            "work-order-updated",
            json!({ "work_order_id": work_order_id, "update": update }),
        )
    }

    /// Personal notice for one user.
    #[must_use]
    pub fn notification(data: Value) -> Self {
        Self::new("notification", data)
    }

    /// Notice for every admin.
    #[must_use]
    pub fn admin_notification(data: Value) -> Self {
        Self::new("admin-notification", data)
    }
}

/// Who is on the other end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub role: UserRole,
}

/// Handle for one registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug)]
struct Subscriber {
    sender: mpsc::Sender<Arc<Event>>,
    topics: HashSet<Topic>,
}

#[derive(Debug, Default)]
struct Registry {
    topics: HashMap<Topic, HashSet<SubscriberId>>,
    subscribers: HashMap<SubscriberId, Subscriber>,
}

impl Registry {
    fn add(&mut self, id: SubscriberId, topic: Topic) -> bool {
        let Some(subscriber) = self.subscribers.get_mut(&id) else {
            return false;
        };
        subscriber.topics.insert(topic);
        self.topics.entry(topic).or_default().insert(id)
    }

    fn remove(&mut self, id: SubscriberId, topic: Topic) -> bool {
        if let Some(subscriber) = self.subscribers.get_mut(&id) {
            subscriber.topics.remove(&topic);
        }
        let Some(members) = self.topics.get_mut(&topic) else {
            return false;
        };
        let removed = members.remove(&id);
        if members.is_empty() {
            self.topics.remove(&topic);
        }
        removed
    }
}

/// Topic registry and fan-out.
#[derive(Debug)]
pub struct Broadcaster {
    registry: RwLock<Registry>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl Broadcaster {
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a connection and subscribe it to its role and user topics.
    pub async fn connect(&self, session: Session) -> (SubscriberId, mpsc::Receiver<Arc<Event>>) {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.queue_capacity);

        let mut registry = self.registry.write().await;
        registry.subscribers.insert(
            id,
            Subscriber {
                sender,
                topics: HashSet::new(),
            },
        );
        registry.add(id, Topic::Role(session.role));
        registry.add(id, Topic::User(session.user_id));

        debug!(subscriber = %id, user_id = %session.user_id, role = %session.role, "Subscriber connected");
        (id, receiver)
    }

    /// Subscribe to a work order's topic. Returns whether it was newly added.
    pub async fn join(&self, id: SubscriberId, work_order_id: WorkOrderId) -> bool {
        self.registry
            .write()
            .await
            .add(id, Topic::WorkOrder(work_order_id))
    }

    /// Unsubscribe from a work order's topic. Returns whether it was present.
    pub async fn leave(&self, id: SubscriberId, work_order_id: WorkOrderId) -> bool {
        self.registry
            .write()
            .await
            .remove(id, Topic::WorkOrder(work_order_id))
    }

    /// Drop a connection and every subscription it holds.
    pub async fn disconnect(&self, id: SubscriberId) {
        let mut registry = self.registry.write().await;
        let Some(subscriber) = registry.subscribers.remove(&id) else {
            return;
        };
        for topic in subscriber.topics {
            if let Some(members) = registry.topics.get_mut(&topic) {
                members.remove(&id);
                if members.is_empty() {
                    registry.topics.remove(&topic);
                }
            }
        }
        debug!(subscriber = %id, "Subscriber disconnected");
    }

    /// Queue `event` for every subscriber of `topic`.
    ///
    /// Returns how many subscribers accepted it.
    pub async fn publish(&self, topic: Topic, event: Event) -> usize {
        let event = Arc::new(event);
        let registry = self.registry.read().await;
        let Some(members) = registry.topics.get(&topic) else {
            trace!(%topic, "No subscribers");
            return 0;
        };

        let mut delivered = 0;
        for id in members {
            let Some(subscriber) = registry.subscribers.get(id) else {
                continue;
            };
            match subscriber.sender.try_send(Arc::clone(&event)) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(subscriber = %id, %topic, "Subscriber queue full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    trace!(subscriber = %id, %topic, "Subscriber gone, event dropped");
                }
            }
        }
        delivered
    }

    /// Subscribers currently on `topic`.
    pub async fn subscriber_count(&self, topic: Topic) -> usize {
        self.registry
            .read()
            .await
            .topics
            .get(&topic)
            .map_or(0, HashSet::len)
    }

    /// Registered connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.subscribers.len()
    }
}
