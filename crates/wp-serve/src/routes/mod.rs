pub mod audit;
pub mod channels;
pub mod check_ins;
pub mod error;
pub mod events;
pub mod health;
pub mod live;
pub mod locations;
pub mod notifications;
pub mod zones;

use crate::middleware::actor::actor_middleware;
use crate::middleware::correlation::correlation_middleware;
use crate::{AppState, openapi};
use axum::Router;
use axum::middleware;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(health::router(state.clone()))
        .merge(zones::router(state.clone()))
        .merge(check_ins::router(state.clone()))
        .merge(locations::router(state.clone()))
        .merge(notifications::router(state.clone()))
        .merge(channels::router(state.clone()))
        .merge(audit::router(state.clone()))
        .merge(events::router(state.clone()))
        .merge(live::router(state))
        .merge(openapi::router())
        .route_layer(middleware::from_fn(actor_middleware))
        .route_layer(middleware::from_fn(correlation_middleware));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
