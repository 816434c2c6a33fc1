use super::engine::BatchResult;

/// Storage abstraction for completed batches so the service can be exercised in isolation.
pub trait AuditHistoryRepository: Send + Sync {
    fn save_batch(&self, batch: BatchResult) -> Result<(), RepositoryError>;
    /// Most recent batches first, at most `limit` of them.
    fn recent(&self, limit: usize) -> Result<Vec<BatchResult>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("audit batch already recorded")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
