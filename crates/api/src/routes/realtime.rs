//! Realtime WebSocket endpoint.
//!
//! Clients connect with `GET /ws?token=<id token>` (or a bearer header) and
//! are subscribed to their user and role topics. They opt into work order
//! topics with `join-work-order` / `leave-work-order` messages.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket, rejection::WebSocketUpgradeRejection},
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use workorder_core::WorkOrderId;

use crate::error::AppError;
use crate::integrations::AuthError;
use crate::middleware::{authenticate, bearer_token};
use crate::services::{Event, Session, SubscriberId};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

/// A message from the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinWorkOrder { work_order_id: WorkOrderId },
    LeaveWorkOrder { work_order_id: WorkOrderId },
}

/// Authenticate, then upgrade.
///
/// The upgrade is checked after the credential so an unauthenticated client
/// gets a 401/403 rather than an upgrade error.
pub async fn connect(
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let token = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&headers))
        .ok_or(AuthError::Missing)?;
    let user = authenticate(&state, token).await?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let session = Session {
        user_id: user.id,
        role: user.role,
    };
    Ok(ws.on_upgrade(move |socket| serve(state, session, socket)))
}

async fn serve(state: AppState, session: Session, mut socket: WebSocket) {
    let broadcaster = state.broadcaster();
    let (id, mut events) = broadcaster.connect(session).await;
    info!(subscriber = %id, user_id = %session.user_id, "WebSocket connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => handle_client_message(&state, id, text.as_str()).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(subscriber = %id, error = %e, "WebSocket receive failed");
                    break;
                }
            },
            event = events.recv() => {
                if !forward(&mut socket, id, event).await {
                    break;
                }
            }
        }
    }

    broadcaster.disconnect(id).await;
    info!(subscriber = %id, "WebSocket disconnected");
}

/// Write one event to the socket. Returns false when the connection is done.
async fn forward(socket: &mut WebSocket, id: SubscriberId, event: Option<Arc<Event>>) -> bool {
    let Some(event) = event else {
        return false;
    };
    let payload = match serde_json::to_string(event.as_ref()) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(subscriber = %id, error = %e, "Failed to encode event");
            return true;
        }
    };
    socket.send(Message::Text(payload.into())).await.is_ok()
}

async fn handle_client_message(state: &AppState, id: SubscriberId, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::JoinWorkOrder { work_order_id }) => {
            state.broadcaster().join(id, work_order_id).await;
            debug!(subscriber = %id, %work_order_id, "Joined work order");
        }
        Ok(ClientMessage::LeaveWorkOrder { work_order_id }) => {
            state.broadcaster().leave(id, work_order_id).await;
            debug!(subscriber = %id, %work_order_id, "Left work order");
        }
        Err(e) => debug!(subscriber = %id, error = %e, "Ignoring unrecognised client message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages_parse() {
        let id = WorkOrderId::random();
        let join = format!(r#"{{"type":"join-work-order","work_order_id":"{id}"}}"#);
        assert_eq!(
            serde_json::from_str::<ClientMessage>(&join).unwrap(),
            ClientMessage::JoinWorkOrder { work_order_id: id }
        );

        let leave = format!(r#"{{"type":"leave-work-order","work_order_id":"{id}"}}"#);
        assert_eq!(
            serde_json::from_str::<ClientMessage>(&leave).unwrap(),
            ClientMessage::LeaveWorkOrder { work_order_id: id }
        );
    }

    #[test]
    fn test_unknown_message_type_is_an_error() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe"}"#).is_err());
    }
}
