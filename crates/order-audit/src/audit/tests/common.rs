use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::audit::alerts::{AlertError, AlertPublisher, FailureAlert};
use crate::audit::engine::{AuditEngine, BatchResult};
use crate::audit::history::{AuditHistoryRepository, RepositoryError};
use crate::audit::rules::AuditRules;
use crate::audit::service::{AuditRequest, AuditService, AuditUpload};

pub(super) const UNSIGNED_CSV: &str = "OrderId,Remarks,Signed By Physician Date,Sent To Physician Date\n\
1,Failed upload,,2025-01-01\n\
2,,,2025-01-20\n";

pub(super) const SIGNED_CSV: &str = "OrderId,Remarks,Signed By Physician Date,Sent To Physician Date\n\
2,,2025-01-22,2025-01-20\n\
3,,2025-01-23,2025-01-20\n";

pub(super) fn upload(file_name: &str, csv: &str) -> AuditUpload {
    AuditUpload {
        file_name: file_name.to_string(),
        agency: None,
        csv: csv.to_string(),
    }
}

pub(super) fn request() -> AuditRequest {
    AuditRequest {
        files: vec![
            upload("Axxess-Luna-Vista_Unsigned.csv", UNSIGNED_CSV),
            upload("Axxess-Luna-Vista_Signed.csv", SIGNED_CSV),
        ],
        alert_threshold: None,
    }
}

pub(super) fn engine() -> Arc<AuditEngine> {
    Arc::new(AuditEngine::new(AuditRules::standard(), 5).expect("engine builds"))
}

pub(super) fn build_service() -> (
    AuditService<MemoryHistory, MemoryAlerts>,
    Arc<MemoryHistory>,
    Arc<MemoryAlerts>,
) {
    let history = Arc::new(MemoryHistory::default());
    let alerts = Arc::new(MemoryAlerts::default());
    let service = AuditService::new(engine(), history.clone(), alerts.clone(), 50.0);
    (service, history, alerts)
}

#[derive(Default, Clone)]
pub(super) struct MemoryHistory {
    batches: Arc<Mutex<Vec<BatchResult>>>,
}

impl MemoryHistory {
    pub(super) fn stored(&self) -> Vec<BatchResult> {
        self.batches.lock().expect("history mutex poisoned").clone()
    }
}

impl AuditHistoryRepository for MemoryHistory {
    fn save_batch(&self, batch: BatchResult) -> Result<(), RepositoryError> {
        self.batches
            .lock()
            .expect("history mutex poisoned")
            .push(batch);
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<BatchResult>, RepositoryError> {
        let guard = self.batches.lock().expect("history mutex poisoned");
        Ok(guard.iter().rev().take(limit).cloned().collect())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAlerts {
    events: Arc<Mutex<Vec<FailureAlert>>>,
    summaries: Arc<Mutex<Vec<BatchResult>>>,
}

impl MemoryAlerts {
    pub(super) fn events(&self) -> Vec<FailureAlert> {
        self.events.lock().expect("alert mutex poisoned").clone()
    }

    pub(super) fn summaries(&self) -> Vec<BatchResult> {
        self.summaries.lock().expect("summary mutex poisoned").clone()
    }
}

impl AlertPublisher for MemoryAlerts {
    fn publish(&self, alerts: &[FailureAlert]) -> Result<(), AlertError> {
        self.events
            .lock()
            .expect("alert mutex poisoned")
            .extend_from_slice(alerts);
        Ok(())
    }

    fn publish_summary(&self, batch: &BatchResult) -> Result<(), AlertError> {
        self.summaries
            .lock()
            .expect("summary mutex poisoned")
            .push(batch.clone());
        Ok(())
    }
}

pub(super) struct OfflineAlerts;

impl AlertPublisher for OfflineAlerts {
    fn publish(&self, _alerts: &[FailureAlert]) -> Result<(), AlertError> {
        Err(AlertError::Transport("webhook offline".to_string()))
    }

    fn publish_summary(&self, _batch: &BatchResult) -> Result<(), AlertError> {
        Err(AlertError::Transport("webhook offline".to_string()))
    }
}

pub(super) struct UnavailableHistory;

impl AuditHistoryRepository for UnavailableHistory {
    fn save_batch(&self, _batch: BatchResult) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn recent(&self, _limit: usize) -> Result<Vec<BatchResult>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
