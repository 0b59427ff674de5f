use crate::AppState;
use crate::middleware::correlation::CorrelationId;
use crate::routes::error::ErrorEnvelope;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use wp_events::Subscription;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/live/{group}/subscribe", get(subscribe))
        .route("/live/{group}/stream", get(stream))
        .with_state(state)
}

/// Only configured recipient groups are live topics; the system and
/// broadcast topics stay internal.
fn open_subscription(
    state: &AppState,
    group: String,
    correlation: CorrelationId,
) -> Result<Subscription, Response> {
    if state.engine.config().is_recipient_group(&group) {
        return Ok(state.event_bus().subscribe(group));
    }
    let envelope = ErrorEnvelope {
        code: "not_found",
        message: format!("unknown recipient group: {group}"),
        correlation_id: Some(correlation.0),
        details: None,
    };
    Err((StatusCode::NOT_FOUND, Json(envelope)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/live/{group}/subscribe",
    params(("group" = String, Path, description = "Recipient group")),
    responses(
        (status = 200, description = "Server-sent events for the group"),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn subscribe(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(group): Path<String>,
) -> Response {
    match open_subscription(&state, group, correlation) {
        Ok(subscription) => crate::sse::subscribe(subscription),
        Err(response) => response,
    }
}

#[utoipa::path(
    get,
    path = "/api/live/{group}/stream",
    params(("group" = String, Path, description = "Recipient group")),
    responses(
        (status = 101, description = "WebSocket upgrade"),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(group): Path<String>,
) -> Response {
    match open_subscription(&state, group, correlation) {
        Ok(subscription) => ws.on_upgrade(move |socket| handle_stream(socket, subscription)),
        Err(response) => response,
    }
}

/// Runs until either side goes away; the subscription is dropped with it.
async fn handle_stream(mut socket: WebSocket, mut subscription: Subscription) {
    tracing::debug!(topic = subscription.topic(), "live session opened");
    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let json = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    tracing::debug!(topic = subscription.topic(), "live session closed");
}
