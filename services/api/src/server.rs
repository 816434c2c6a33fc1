use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryAlertPublisher, InMemoryAuditHistory};
use crate::routes::with_audit_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use order_audit::audit::{AuditEngine, AuditService};
use order_audit::config::AppConfig;
use order_audit::error::AppError;
use order_audit::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let audit = config.audit;
    let engine = Arc::new(AuditEngine::new(
        audit.rules,
        audit.pending_overdue_threshold_days,
    )?);
    let history = Arc::new(InMemoryAuditHistory::default());
    let alerts = Arc::new(InMemoryAlertPublisher::default());
    let audit_service = Arc::new(AuditService::new(
        engine,
        history,
        alerts,
        audit.alert_failure_threshold,
    ));

    let app = with_audit_routes(audit_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        overdue_days = audit.pending_overdue_threshold_days,
        alert_threshold = audit.alert_failure_threshold,
        "order audit service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
