use std::io::Cursor;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use super::alerts::AlertPublisher;
use super::engine::{AuditEngine, AuditFile, BatchResult};
use super::error::AuditError;
use super::history::{AuditHistoryRepository, RepositoryError};
use super::table::Table;

pub const DEFAULT_HISTORY_LIMIT: usize = 25;

/// Batch request accepted by the HTTP surface: raw CSV exports plus an optional threshold.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditRequest {
    pub files: Vec<AuditUpload>,
    #[serde(default)]
    pub alert_threshold: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditUpload {
    pub file_name: String,
    #[serde(default)]
    pub agency: Option<String>,
    pub csv: String,
}

impl AuditUpload {
    fn into_audit_file(self) -> Result<AuditFile, AuditError> {
        let table = Table::from_csv_reader(Cursor::new(self.csv.into_bytes()))?;
        Ok(AuditFile {
            file_name: self.file_name,
            agency: self.agency,
            table,
        })
    }
}

/// Service composing the engine with history persistence and alert delivery.
pub struct AuditService<R, A> {
    engine: Arc<AuditEngine>,
    history: Arc<R>,
    alerts: Arc<A>,
    alert_threshold: f64,
}

impl<R, A> AuditService<R, A>
where
    R: AuditHistoryRepository + 'static,
    A: AlertPublisher + 'static,
{
    pub fn new(engine: Arc<AuditEngine>, history: Arc<R>, alerts: Arc<A>, alert_threshold: f64) -> Self {
        Self {
            engine,
            history,
            alerts,
            alert_threshold,
        }
    }

    pub fn engine(&self) -> &AuditEngine {
        &self.engine
    }

    /// Parse uploads, run the batch, persist it, and publish alerts and the summary.
    pub fn audit(&self, request: AuditRequest) -> Result<BatchResult, AuditServiceError> {
        let threshold = request.alert_threshold.unwrap_or(self.alert_threshold);
        if !(0.0..=100.0).contains(&threshold) {
            return Err(AuditServiceError::InvalidThreshold(threshold));
        }

        let files = request
            .files
            .into_iter()
            .map(AuditUpload::into_audit_file)
            .collect::<Result<Vec<_>, _>>()?;

        self.run(&files, threshold)
    }

    /// Run an already-parsed batch using the configured alert threshold.
    pub fn audit_files(&self, files: &[AuditFile]) -> Result<BatchResult, AuditServiceError> {
        self.run(files, self.alert_threshold)
    }

    fn run(&self, files: &[AuditFile], threshold: f64) -> Result<BatchResult, AuditServiceError> {
        let batch = self.engine.run_batch(files, threshold, Utc::now())?;
        self.history.save_batch(batch.clone())?;

        if !batch.alerts.is_empty() {
            match self.alerts.publish(&batch.alerts) {
                Ok(()) => info!(
                    audit_id = %batch.audit_id,
                    alerts = batch.alerts.len(),
                    "published failure alerts"
                ),
                Err(error) => warn!(
                    audit_id = %batch.audit_id,
                    %error,
                    "failure alerts could not be delivered"
                ),
            }
        }

        if !batch.audit_results.is_empty() || !batch.paired_results.is_empty() {
            if let Err(error) = self.alerts.publish_summary(&batch) {
                warn!(
                    audit_id = %batch.audit_id,
                    %error,
                    "batch summary could not be delivered"
                );
            }
        }

        Ok(batch)
    }

    pub fn history(&self, limit: usize) -> Result<Vec<BatchResult>, AuditServiceError> {
        Ok(self.history.recent(limit)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditServiceError {
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error("alert threshold must be between 0 and 100, got {0}")]
    InvalidThreshold(f64),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AuditServiceError {
    /// True when the caller sent something the engine cannot audit.
    pub fn is_client_error(&self) -> bool {
        match self {
            AuditServiceError::Audit(error) => error.is_input_error(),
            AuditServiceError::InvalidThreshold(_) => true,
            AuditServiceError::Repository(_) => false,
        }
    }
}
