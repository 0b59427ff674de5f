use crate::middleware::correlation::CorrelationId;
use crate::routes::error::error_response;
use crate::AppState;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use wp_core::types::{AuditEntry, AuditFilter};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/audit", get(list_audit))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/audit",
    params(AuditFilter),
    responses((status = 200, body = Vec<AuditEntry>))
)]
pub(crate) async fn list_audit(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Query(filter): Query<AuditFilter>,
) -> Response {
    match state.engine.audit().list(&filter) {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => error_response(err, Some(correlation.0)),
    }
}
