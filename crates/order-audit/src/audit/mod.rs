//! Order-export auditing: failure classification, SLA metrics, signed/unsigned pairing,
//! and agency-level reconciliation.
//!
//! [`AuditEngine`] is the entry point for library callers. [`AuditService`] layers history
//! persistence and alert delivery on top, and [`audit_router`] exposes it over HTTP.

pub mod alerts;
pub mod analysis;
pub mod engine;
mod error;
pub mod history;
pub mod identifiers;
pub mod matcher;
pub mod pairing;
pub mod reconciliation;
pub mod router;
pub mod rules;
pub mod service;
pub mod sla;
pub mod stats;
pub mod table;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use alerts::{
    select_failure_alerts, AlertError, AlertPublisher, FailureAlert,
    DEFAULT_ALERT_FAILURE_THRESHOLD,
};
pub use analysis::{
    derive_pair_key, infer_agency_from_filename, infer_ehr_from_filename, FileAnalysis,
    TemplateType,
};
pub use engine::{AuditEngine, AuditFile, BatchResult};
pub use error::AuditError;
pub use history::{AuditHistoryRepository, RepositoryError};
pub use identifiers::extract_identifiers;
pub use matcher::{build_failure_mask, FailureMask, FailurePattern, PatternCache};
pub use pairing::{build_pairs, CombinedSummary, DocumentsProcessed, PairResult};
pub use reconciliation::{build_reconciliation, ReconciliationEntry};
pub use router::audit_router;
pub use rules::{AgencyRule, AuditRules, ColumnLayout, RuleError};
pub use service::{
    AuditRequest, AuditService, AuditServiceError, AuditUpload, DEFAULT_HISTORY_LIMIT,
};
pub use sla::{compute_sla, SlaMetrics, DEFAULT_PENDING_OVERDUE_DAYS};
pub use stats::{calculate_stats, AnalysisContext, FileStats};
pub use table::{CellValue, Table};
