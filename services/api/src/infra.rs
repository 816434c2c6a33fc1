use metrics_exporter_prometheus::PrometheusHandle;
use order_audit::audit::{
    AlertError, AlertPublisher, AuditHistoryRepository, BatchResult, FailureAlert,
    RepositoryError,
};
use order_audit::config::parse_alert_threshold;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Batches kept by the in-memory history before the oldest are dropped.
pub(crate) const HISTORY_CAPACITY: usize = 200;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Clone)]
pub(crate) struct InMemoryAuditHistory {
    batches: Arc<Mutex<VecDeque<BatchResult>>>,
    capacity: usize,
}

impl Default for InMemoryAuditHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl InMemoryAuditHistory {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            batches: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }
}

impl AuditHistoryRepository for InMemoryAuditHistory {
    fn save_batch(&self, batch: BatchResult) -> Result<(), RepositoryError> {
        let mut guard = self.batches.lock().expect("history mutex poisoned");
        if guard.iter().any(|stored| stored.audit_id == batch.audit_id) {
            return Err(RepositoryError::Conflict);
        }
        while guard.len() >= self.capacity.max(1) {
            guard.pop_front();
        }
        guard.push_back(batch);
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<BatchResult>, RepositoryError> {
        let guard = self.batches.lock().expect("history mutex poisoned");
        Ok(guard.iter().rev().take(limit).cloned().collect())
    }
}

/// Logs each alert and batch summary and keeps them for inspection; stands in for a
/// webhook or e-mail adapter.
#[derive(Default, Clone)]
pub(crate) struct InMemoryAlertPublisher {
    events: Arc<Mutex<Vec<FailureAlert>>>,
    summaries: Arc<Mutex<Vec<String>>>,
}

impl AlertPublisher for InMemoryAlertPublisher {
    fn publish(&self, alerts: &[FailureAlert]) -> Result<(), AlertError> {
        for alert in alerts {
            warn!(
                agency = %alert.agency,
                file_name = %alert.file_name,
                failure_rate = %alert.failure_rate,
                reasons = alert.unique_failure_reasons.len(),
                "order export failure rate above threshold"
            );
        }
        let mut guard = self.events.lock().expect("alert mutex poisoned");
        guard.extend_from_slice(alerts);
        Ok(())
    }

    fn publish_summary(&self, batch: &BatchResult) -> Result<(), AlertError> {
        info!(
            audit_id = %batch.audit_id,
            files = batch.audit_results.len(),
            pairs = batch.paired_results.len(),
            agencies = batch.reconciliation_summary.len(),
            alerts = batch.alerts.len(),
            "order export audit summary"
        );
        let mut guard = self.summaries.lock().expect("summary mutex poisoned");
        guard.push(batch.audit_id.clone());
        Ok(())
    }
}

impl InMemoryAlertPublisher {
    #[cfg(test)]
    pub(crate) fn events(&self) -> Vec<FailureAlert> {
        self.events.lock().expect("alert mutex poisoned").clone()
    }

    #[cfg(test)]
    pub(crate) fn summaries(&self) -> Vec<String> {
        self.summaries.lock().expect("summary mutex poisoned").clone()
    }
}

pub(crate) fn parse_threshold(raw: &str) -> Result<f64, String> {
    parse_alert_threshold(raw).map_err(|err| format!("failed to parse '{raw}' ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn batch(audit_id: &str) -> BatchResult {
        BatchResult {
            audit_id: audit_id.to_string(),
            audit_timestamp: Utc::now(),
            audit_results: Vec::new(),
            paired_results: Vec::new(),
            reconciliation_summary: Vec::new(),
            alerts: Vec::new(),
        }
    }

    #[test]
    fn history_drops_oldest_batches_past_capacity() {
        let history = InMemoryAuditHistory::with_capacity(2);
        for id in ["audit-1", "audit-2", "audit-3"] {
            history.save_batch(batch(id)).expect("save succeeds");
        }

        let ids: Vec<String> = history
            .recent(10)
            .expect("recent loads")
            .into_iter()
            .map(|batch| batch.audit_id)
            .collect();
        assert_eq!(ids, vec!["audit-3".to_string(), "audit-2".to_string()]);
    }

    #[test]
    fn zero_capacity_history_keeps_only_latest_batch() {
        let history = InMemoryAuditHistory::with_capacity(0);
        for id in ["audit-1", "audit-2", "audit-3"] {
            history.save_batch(batch(id)).expect("save succeeds");
        }

        let stored = history.recent(10).expect("recent loads");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].audit_id, "audit-3");
    }

    #[test]
    fn history_rejects_duplicate_audit_ids() {
        let history = InMemoryAuditHistory::default();
        history.save_batch(batch("audit-1")).expect("first save");
        assert!(matches!(
            history.save_batch(batch("audit-1")),
            Err(RepositoryError::Conflict)
        ));
    }

    #[test]
    fn summaries_are_recorded_by_audit_id() {
        let publisher = InMemoryAlertPublisher::default();
        publisher
            .publish_summary(&batch("audit-7"))
            .expect("summary publishes");
        assert_eq!(publisher.summaries(), vec!["audit-7".to_string()]);
    }

    #[test]
    fn threshold_parser_rejects_out_of_range_values() {
        assert_eq!(parse_threshold("40"), Ok(40.0));
        assert!(parse_threshold("-5").is_err());
    }
}
