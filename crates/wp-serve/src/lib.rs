pub mod auto_channel;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod sse;

use axum::Router;
use middleware::actor::Actor;
use middleware::correlation::CorrelationId;
use std::sync::Arc;
use tokio::net::TcpListener;
use wp_core::{Engine, RequestContext};
use wp_db::SqliteProvider;
use wp_events::EventBus;
use wp_events::types::EventSource;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine<SqliteProvider>>,
}

impl AppState {
    pub fn new(engine: Engine<SqliteProvider>) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        self.engine.event_bus()
    }
}

pub fn request_context(
    source: EventSource,
    correlation: CorrelationId,
    actor: Actor,
) -> RequestContext {
    RequestContext::new(source, Some(correlation.0), actor.0)
}

pub fn app(state: AppState) -> Router {
    routes::router(state)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app(state)).await
}
