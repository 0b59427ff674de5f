use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use wp_events::{EventRecord, Subscription};

/// Live-only: a new session sees what is published after it connects.
pub fn subscribe(subscription: Subscription) -> Response {
    let stream = subscription
        .into_stream()
        .map(|event| Ok::<Event, Infallible>(to_event(&event)));
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn to_event(record: &EventRecord) -> Event {
    let json = serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string());
    let event = Event::default().id(record.seq.to_string()).data(json);
    match record.kind() {
        Some(kind) => event.event(kind),
        None => event,
    }
}
