/// Errors raised while loading or analysing audit input.
///
/// Per-row problems (unparsable dates, blank identifiers) never surface here;
/// they are dropped from the affected aggregate instead.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("failed to read order export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid order export CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("failure pattern could not be compiled: {0}")]
    Pattern(#[from] regex::Error),
}

impl AuditError {
    /// True when the error stems from caller-supplied data rather than the host.
    pub fn is_input_error(&self) -> bool {
        matches!(self, AuditError::Csv(_))
    }
}
