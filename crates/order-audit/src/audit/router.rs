use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::alerts::AlertPublisher;
use super::history::AuditHistoryRepository;
use super::service::{AuditRequest, AuditService, AuditServiceError, DEFAULT_HISTORY_LIMIT};

/// Router builder exposing batch submission and history lookups.
pub fn audit_router<R, A>(service: Arc<AuditService<R, A>>) -> Router
where
    R: AuditHistoryRepository + 'static,
    A: AlertPublisher + 'static,
{
    Router::new()
        .route("/api/v1/audits", post(audit_handler::<R, A>))
        .route("/api/v1/audits/history", get(history_handler::<R, A>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    limit: Option<usize>,
}

pub(crate) async fn audit_handler<R, A>(
    State(service): State<Arc<AuditService<R, A>>>,
    axum::Json(request): axum::Json<AuditRequest>,
) -> Response
where
    R: AuditHistoryRepository + 'static,
    A: AlertPublisher + 'static,
{
    match service.audit(request) {
        Ok(batch) => (StatusCode::OK, axum::Json(batch)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn history_handler<R, A>(
    State(service): State<Arc<AuditService<R, A>>>,
    Query(query): Query<HistoryQuery>,
) -> Response
where
    R: AuditHistoryRepository + 'static,
    A: AlertPublisher + 'static,
{
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    match service.history(limit) {
        Ok(batches) => (StatusCode::OK, axum::Json(batches)).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: AuditServiceError) -> Response {
    let status = if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
