use super::alerts::{select_failure_alerts, FailureAlert};
use super::analysis::{
    derive_pair_key, infer_agency_from_filename, infer_ehr_from_filename, FileAnalysis,
    TemplateType,
};
use super::error::AuditError;
use super::identifiers::extract_identifiers;
use super::matcher::PatternCache;
use super::pairing::{build_pairs, PairResult};
use super::reconciliation::{build_reconciliation, ReconciliationEntry};
use super::rules::AuditRules;
use super::stats::{calculate_stats, AnalysisContext};
use super::table::Table;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, info_span, warn};

static AUDIT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_audit_id() -> String {
    let id = AUDIT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("audit-{id:06}")
}

/// One export handed to a batch run. Without an agency, it is inferred from the name.
#[derive(Debug, Clone)]
pub struct AuditFile {
    pub file_name: String,
    pub agency: Option<String>,
    pub table: Table,
}

impl AuditFile {
    pub fn new(file_name: impl Into<String>, table: Table) -> Self {
        Self {
            file_name: file_name.into(),
            agency: None,
            table,
        }
    }

    pub fn with_agency(mut self, agency: impl Into<String>) -> Self {
        self.agency = Some(agency.into());
        self
    }

    fn resolved_agency(&self) -> String {
        match self.agency.as_deref().map(str::trim) {
            Some(agency) if !agency.is_empty() => agency.to_string(),
            _ => infer_agency_from_filename(&self.file_name),
        }
    }
}

/// Output of one batch run, handed to persistence and notification collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub audit_id: String,
    pub audit_timestamp: DateTime<Utc>,
    pub audit_results: Vec<FileAnalysis>,
    pub paired_results: Vec<PairResult>,
    pub reconciliation_summary: Vec<ReconciliationEntry>,
    pub alerts: Vec<FailureAlert>,
}

/// Stateless apart from the compiled-pattern cache; safe to share across requests.
#[derive(Debug)]
pub struct AuditEngine {
    rules: AuditRules,
    patterns: PatternCache,
    overdue_threshold_days: u32,
}

impl AuditEngine {
    /// Builds the engine and compiles every registered rule's pattern up front, so
    /// a bad keyword set fails here rather than mid-batch.
    pub fn new(rules: AuditRules, overdue_threshold_days: u32) -> Result<Self, AuditError> {
        let patterns = PatternCache::new();
        for rule in rules.all_rules() {
            patterns.get_or_compile(rule.failure_keywords())?;
        }

        Ok(Self {
            rules,
            patterns,
            overdue_threshold_days,
        })
    }

    pub fn rules(&self) -> &AuditRules {
        &self.rules
    }

    pub fn overdue_threshold_days(&self) -> u32 {
        self.overdue_threshold_days
    }

    pub fn analyze_file(
        &self,
        table: &Table,
        file_name: &str,
        agency: &str,
    ) -> Result<FileAnalysis, AuditError> {
        self.analyze_file_at(table, file_name, agency, Utc::now().naive_utc())
    }

    /// Same as [`AuditEngine::analyze_file`] with an explicit clock for overdue checks.
    pub fn analyze_file_at(
        &self,
        table: &Table,
        file_name: &str,
        agency: &str,
        now: NaiveDateTime,
    ) -> Result<FileAnalysis, AuditError> {
        let rule = self.rules.resolve(agency);
        let layout = self.rules.layout();
        let ctx = AnalysisContext {
            layout,
            patterns: &self.patterns,
            overdue_threshold_days: self.overdue_threshold_days,
            now,
        };

        let stats = calculate_stats(table, rule, &ctx)?;
        let order_ids = extract_identifiers(table, layout.identifier_columns());
        let template_type = TemplateType::from_file_name(file_name);

        debug!(
            file_name,
            agency,
            template_type = template_type.label(),
            rows = stats.total_rows,
            failures = stats.failure_count,
            "analyzed order export"
        );

        Ok(FileAnalysis {
            agency: agency.to_string(),
            ehr: infer_ehr_from_filename(file_name),
            file_name: file_name.to_string(),
            template_type,
            pair_key: derive_pair_key(file_name),
            stats,
            order_ids,
        })
    }

    /// Analyses every file in input order, then pairs, reconciles, and selects alerts.
    pub fn run_batch(
        &self,
        files: &[AuditFile],
        alert_threshold: f64,
        now: DateTime<Utc>,
    ) -> Result<BatchResult, AuditError> {
        let audit_id = next_audit_id();
        let span = info_span!("audit", audit_id = %audit_id);
        let _entered = span.enter();

        if files.is_empty() {
            warn!("audit batch contains no files");
        }

        let naive_now = now.naive_utc();
        let audit_results = files
            .iter()
            .map(|file| {
                let agency = file.resolved_agency();
                self.analyze_file_at(&file.table, &file.file_name, &agency, naive_now)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let paired_results = build_pairs(&audit_results);
        let reconciliation_summary = build_reconciliation(&audit_results);
        let alerts = select_failure_alerts(&audit_results, alert_threshold);

        info!(
            files = audit_results.len(),
            pairs = paired_results.len(),
            agencies = reconciliation_summary.len(),
            alerts = alerts.len(),
            "audit batch completed"
        );

        Ok(BatchResult {
            audit_id,
            audit_timestamp: now,
            audit_results,
            paired_results,
            reconciliation_summary,
            alerts,
        })
    }
}
