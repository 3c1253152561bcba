//! Notification Routes
//!
//! HTTP surface of the notification hub:
//!
//! - GET /api/v1/sse/:user_id - open the user's SSE stream
//! - GET /api/v1/sse/:user_id/connect - confirm the stream is up
//! - GET /api/v1/send/:user_id - push a notification to one user
//! - POST /api/v1/send - push a notification to a group of users
//!
//! Each call is independent and stateless except for its effect on the hub.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::api::dto::SendGroupRequest;
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::notify::{HubEvent, Notification};

/// GET /api/v1/sse/:user_id
///
/// Opens (or reattaches to) the user's notification stream as Server-Sent
/// Events. Dropping the response releases the subscription unless a newer
/// stream for the same user has taken over.
pub async fn sse_stream(
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = state.hub.subscribe(&user_id).await;
    let events = stream.map(|event| Ok(to_sse_event(event)));

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// GET /api/v1/sse/:user_id/connect
///
/// Emits the synthetic "connected" event on the user's stream. 404 when the
/// user has no active stream - the caller is expected to have just subscribed.
pub async fn sse_confirm(
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<bool>> {
    state.hub.acknowledge_connected(&user_id).await?;
    Ok(Json(true))
}

/// GET /api/v1/send/:user_id
///
/// Publishes a notification to a single user. Returns false when the user has
/// no live subscription - an offline recipient is a normal outcome here.
pub async fn send_to_user(
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Json<bool> {
    let notification = Notification::new(user_id.clone(), "new message sent", "1");
    let delivered = state.hub.publish(&user_id, notification).await;
    Json(delivered)
}

/// POST /api/v1/send
///
/// Publishes a notification to each listed user independently; offline users
/// are skipped without affecting the others.
pub async fn send_to_group(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendGroupRequest>,
) -> Json<bool> {
    let notification = Notification::new(Uuid::new_v4().to_string(), "new message sent", "1");
    let reached = state.hub.publish_many(&request.to, notification).await;

    tracing::debug!(
        requested = request.to.len(),
        reached,
        "group notification published"
    );
    Json(true)
}

/// Map a hub event to its SSE representation
///
/// Published notifications go out as `message` events with a JSON body;
/// the connected acknowledgement goes out as a `config` event.
fn to_sse_event(event: HubEvent) -> Event {
    match event {
        HubEvent::Message(notification) => {
            let id = notification.id.clone();
            match Event::default()
                .event("message")
                .id(id)
                .json_data(&notification)
            {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize notification event");
                    Event::default().event("message").data(notification.message)
                }
            }
        }
        HubEvent::Connected => Event::default().event("config").data("connected"),
    }
}
