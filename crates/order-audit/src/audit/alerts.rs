use super::analysis::FileAnalysis;
use super::engine::BatchResult;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ALERT_FAILURE_THRESHOLD: f64 = 50.0;

/// A file whose failure rate reached the alert threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureAlert {
    pub agency: String,
    pub file_name: String,
    pub failure_rate: String,
    pub unique_failure_reasons: Vec<String>,
}

/// Files at or above `threshold` percent failures, in input order.
pub fn select_failure_alerts(analyses: &[FileAnalysis], threshold: f64) -> Vec<FailureAlert> {
    analyses
        .iter()
        .filter(|entry| entry.stats.failure_rate_value() >= threshold)
        .map(|entry| FailureAlert {
            agency: entry.agency.clone(),
            file_name: entry.file_name.clone(),
            failure_rate: entry.stats.failure_rate.clone(),
            unique_failure_reasons: entry.stats.unique_failure_reasons.clone(),
        })
        .collect()
}

/// Outbound hook for failure alerts and batch summaries (webhook, e-mail, chat adapters).
pub trait AlertPublisher: Send + Sync {
    fn publish(&self, alerts: &[FailureAlert]) -> Result<(), AlertError>;

    /// Delivers the completed batch as a whole. Only called for batches that produced
    /// per-file results or pairs.
    fn publish_summary(&self, batch: &BatchResult) -> Result<(), AlertError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("alert transport unavailable: {0}")]
    Transport(String),
}
