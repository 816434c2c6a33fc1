use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use order_audit::audit::{audit_router, AlertPublisher, AuditHistoryRepository, AuditService};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_audit_routes<R, A>(service: Arc<AuditService<R, A>>) -> axum::Router
where
    R: AuditHistoryRepository + 'static,
    A: AlertPublisher + 'static,
{
    audit_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{InMemoryAlertPublisher, InMemoryAuditHistory};
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use order_audit::audit::{AuditEngine, AuditRules};
    use serde_json::Value;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn state(ready: bool) -> AppState {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(handle),
        }
    }

    fn app(alerts: Arc<InMemoryAlertPublisher>) -> axum::Router {
        let engine = Arc::new(AuditEngine::new(AuditRules::standard(), 5).expect("engine builds"));
        let service = Arc::new(AuditService::new(
            engine,
            Arc::new(InMemoryAuditHistory::default()),
            alerts,
            50.0,
        ));
        with_audit_routes(service).layer(Extension(state(true)))
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn readiness_reflects_startup_flag() {
        let pending = readiness_endpoint(Extension(state(false)))
            .await
            .into_response();
        assert_eq!(pending.status(), StatusCode::SERVICE_UNAVAILABLE);

        let ready = readiness_endpoint(Extension(state(true)))
            .await
            .into_response();
        assert_eq!(ready.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn audit_route_publishes_alerts_and_records_history() {
        let alerts = Arc::new(InMemoryAlertPublisher::default());
        let app = app(alerts.clone());

        let body = json!({
            "files": [{
                "file_name": "Athena-Cedar-Grove_Unsigned.csv",
                "csv": "OrderId,Remarks\n1,Missing face to face\n2,Error on fax\n3,\n"
            }]
        });
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1/audits")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["audit_results"][0]["agency"], json!("Cedar Grove"));
        assert_eq!(payload["audit_results"][0]["ehr"], json!("Athena"));
        assert_eq!(payload["audit_results"][0]["stats"]["failure_rate"], json!("66.7%"));

        let events = alerts.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].agency, "Cedar Grove");
        let audit_id = payload["audit_id"].as_str().expect("audit id").to_string();
        assert_eq!(alerts.summaries(), vec![audit_id]);

        let history = app
            .oneshot(
                Request::get("/api/v1/audits/history")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("route executes");
        assert_eq!(history.status(), StatusCode::OK);
        let batches = json_body(history).await;
        assert_eq!(batches.as_array().map(Vec::len), Some(1));
        assert_eq!(batches[0]["audit_id"], payload["audit_id"]);
    }

    #[tokio::test]
    async fn malformed_request_body_is_rejected() {
        let response = app(Arc::new(InMemoryAlertPublisher::default()))
            .oneshot(
                Request::post("/api/v1/audits")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{ "files": "not-a-list" }"#))
                    .unwrap(),
            )
            .await
            .expect("route executes");

        assert!(response.status().is_client_error());
    }
}
