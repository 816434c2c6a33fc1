use super::identifiers::row_identifier;
use super::matcher::{build_failure_mask, FailureMask, FailurePattern, PatternCache};
use super::rules::{AgencyRule, ColumnLayout};
use super::sla::{compute_sla, SlaMetrics};
use super::table::Table;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Inputs shared by every file analysed in one run.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub layout: &'a ColumnLayout,
    pub patterns: &'a PatternCache,
    pub overdue_threshold_days: u32,
    pub now: NaiveDateTime,
}

/// Per-file audit statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStats {
    pub total_rows: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub signed_count: usize,
    pub unsigned_count: usize,
    pub success_rate: String,
    pub failure_rate: String,
    pub unique_failure_reasons: Vec<String>,
    pub failure_reason_counts: BTreeMap<String, usize>,
    pub failure_details: BTreeMap<String, Vec<String>>,
    pub inspected_status_columns: Vec<String>,
    #[serde(rename = "sla_metrics")]
    pub sla: SlaMetrics,
}

impl FileStats {
    fn empty(sla: SlaMetrics) -> Self {
        Self {
            total_rows: 0,
            success_count: 0,
            failure_count: 0,
            signed_count: 0,
            unsigned_count: 0,
            success_rate: format_rate(0.0),
            failure_rate: format_rate(0.0),
            unique_failure_reasons: Vec::new(),
            failure_reason_counts: BTreeMap::new(),
            failure_details: BTreeMap::new(),
            inspected_status_columns: Vec::new(),
            sla,
        }
    }

    /// Failure rate as a number, parsed back from its percentage label.
    pub fn failure_rate_value(&self) -> f64 {
        parse_rate(&self.failure_rate)
    }

    pub fn success_rate_value(&self) -> f64 {
        parse_rate(&self.success_rate)
    }
}

pub fn calculate_stats(
    table: &Table,
    rule: &AgencyRule,
    ctx: &AnalysisContext<'_>,
) -> Result<FileStats, regex::Error> {
    let pattern = ctx.patterns.get_or_compile(rule.failure_keywords())?;
    let sla = compute_sla(table, ctx.layout, ctx.overdue_threshold_days, ctx.now);

    let total_rows = table.len();
    if total_rows == 0 {
        return Ok(FileStats::empty(sla));
    }

    let mask = build_failure_mask(table, &pattern, rule.status_columns());
    let failure_count = mask.failure_count();
    let success_count = total_rows - failure_count;

    let signed_count = table
        .column_index(ctx.layout.signature_column())
        .map(|index| {
            (0..total_rows)
                .filter(|row| table.cell_datetime(*row, index).is_some())
                .count()
        })
        .unwrap_or(0);
    let unsigned_count = total_rows - signed_count;

    let success_rate = success_count as f64 / total_rows as f64 * 100.0;
    let failure_rate = 100.0 - success_rate;

    let (unique_failure_reasons, failure_reason_counts, failure_details) = if failure_count > 0 {
        let collected = collect_failure_values(table, &mask, &pattern, ctx.layout);
        let (unique, counts) = tally_reasons(collected);
        let details = attribute_failures(table, &mask, &pattern, ctx.layout);
        (unique, counts, details)
    } else {
        (Vec::new(), BTreeMap::new(), BTreeMap::new())
    };

    Ok(FileStats {
        total_rows,
        success_count,
        failure_count,
        signed_count,
        unsigned_count,
        success_rate: format_rate(success_rate),
        failure_rate: format_rate(failure_rate),
        unique_failure_reasons,
        failure_reason_counts,
        failure_details,
        inspected_status_columns: mask.inspected_columns().to_vec(),
        sla,
    })
}

/// Aggregate pass: failing values column by column, remarks first.
///
/// Remarks are taken verbatim; other inspected columns only contribute values that
/// match the pattern on their own, since the row may have failed on another column.
fn collect_failure_values(
    table: &Table,
    mask: &FailureMask,
    pattern: &FailurePattern,
    layout: &ColumnLayout,
) -> Vec<String> {
    let mut collected = Vec::new();

    if let Some(index) = table.column_index(layout.remarks_column()) {
        collected.extend(
            mask.failed_rows()
                .filter_map(|row| failing_value(table, row, index)),
        );
    }

    for column in mask.inspected_columns() {
        if column == layout.remarks_column() {
            continue;
        }
        let Some(index) = table.column_index(column) else {
            continue;
        };
        collected.extend(
            mask.failed_rows()
                .filter_map(|row| failing_value(table, row, index))
                .filter(|value| pattern.is_match(value)),
        );
    }

    collected
}

/// Attribution pass: walks failing rows in order and files each row's identifier
/// under every failure value found on that row.
fn attribute_failures(
    table: &Table,
    mask: &FailureMask,
    pattern: &FailurePattern,
    layout: &ColumnLayout,
) -> BTreeMap<String, Vec<String>> {
    let mut details: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let remarks_index = table.column_index(layout.remarks_column());

    for row in mask.failed_rows() {
        let identifier = row_identifier(table, row, layout.identifier_columns());

        if let Some(remark) = remarks_index.and_then(|index| failing_value(table, row, index)) {
            details.entry(remark).or_default().push(identifier.clone());
        }

        for column in mask.inspected_columns() {
            if column == layout.remarks_column() {
                continue;
            }
            let Some(value) = table
                .column_index(column)
                .and_then(|index| failing_value(table, row, index))
            else {
                continue;
            };
            if pattern.is_match(&value) {
                details.entry(value).or_default().push(identifier.clone());
            }
        }
    }

    details
}

fn failing_value(table: &Table, row: usize, column: usize) -> Option<String> {
    let value = table.cell(row, column)?.as_text().trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn tally_reasons(collected: Vec<String>) -> (Vec<String>, BTreeMap<String, usize>) {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    let mut counts = BTreeMap::new();

    for value in collected {
        *counts.entry(value.clone()).or_insert(0) += 1;
        if seen.insert(value.clone()) {
            unique.push(value);
        }
    }

    (unique, counts)
}

fn format_rate(value: f64) -> String {
    format!("{value:.1}%")
}

fn parse_rate(label: &str) -> f64 {
    label.trim().trim_end_matches('%').parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::rules::AuditRules;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn stats_for(table: &Table) -> FileStats {
        let rules = AuditRules::standard();
        let patterns = PatternCache::new();
        let ctx = AnalysisContext {
            layout: rules.layout(),
            patterns: &patterns,
            overdue_threshold_days: 5,
            now: now(),
        };
        calculate_stats(table, rules.default_rule(), &ctx).expect("stats compute")
    }

    #[test]
    fn empty_table_reports_zero_rates() {
        let table = Table::new(["OrderId", "Remarks"]);
        let stats = stats_for(&table);

        assert_eq!(stats.total_rows, 0);
        assert_eq!(stats.success_rate, "0.0%");
        assert_eq!(stats.failure_rate, "0.0%");
        assert!(stats.unique_failure_reasons.is_empty());
        assert!(stats.failure_details.is_empty());
        assert!(stats.inspected_status_columns.is_empty());
        assert!(stats.sla.pending_overdue_count.is_none());
    }

    #[test]
    fn counts_and_rates_are_complementary() {
        let table = Table::from_text_rows(
            &["OrderId", "Remarks", "Signed By Physician Date"],
            vec![
                vec![Some("1"), Some("Upload failed"), None],
                vec![Some("2"), None, Some("2025-01-10")],
                vec![Some("3"), None, Some("not a date")],
            ],
        );

        let stats = stats_for(&table);

        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.signed_count, 1);
        assert_eq!(stats.unsigned_count, 2);
        assert_eq!(stats.success_rate, "66.7%");
        assert_eq!(stats.failure_rate, "33.3%");
        assert_eq!(stats.inspected_status_columns, vec!["Remarks".to_string()]);
    }

    #[test]
    fn status_values_only_count_when_they_match_individually() {
        let table = Table::from_text_rows(
            &["OrderId", "Remarks", "Order Upload Status"],
            vec![
                vec![Some("1"), Some("Patient missing"), Some("Uploaded")],
                vec![Some("2"), None, Some("Upload failed")],
            ],
        );

        let stats = stats_for(&table);

        assert_eq!(
            stats.unique_failure_reasons,
            vec!["Patient missing".to_string(), "Upload failed".to_string()]
        );
        assert!(!stats.failure_reason_counts.contains_key("Uploaded"));
        assert_eq!(stats.failure_details["Patient missing"], vec!["1".to_string()]);
        assert_eq!(stats.failure_details["Upload failed"], vec!["2".to_string()]);
    }

    #[test]
    fn remarks_are_collected_even_without_keyword_match() {
        let table = Table::from_text_rows(
            &["Remarks", "Order Upload Status"],
            vec![vec![Some("see attachment"), Some("Error 500")]],
        );

        let stats = stats_for(&table);

        assert_eq!(
            stats.unique_failure_reasons,
            vec!["see attachment".to_string(), "Error 500".to_string()]
        );
        assert_eq!(stats.failure_details["see attachment"], vec!["Row 2".to_string()]);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let table = Table::from_text_rows(
            &["OrderId", "Remarks"],
            vec![
                vec![Some("1"), Some("failed")],
                vec![Some("2"), Some("Error: missing NPI")],
            ],
        );

        let first = serde_json::to_string(&stats_for(&table)).expect("serialize");
        let second = serde_json::to_string(&stats_for(&table)).expect("serialize");
        assert_eq!(first, second);
    }

    #[test]
    fn rate_labels_parse_back_to_numbers() {
        let table = Table::from_text_rows(&["Remarks"], vec![vec![Some("failed")]]);
        let stats = stats_for(&table);
        assert_eq!(stats.failure_rate_value(), 100.0);
        assert_eq!(stats.success_rate_value(), 0.0);
    }
}
