use super::analysis::{derive_pair_key, FileAnalysis, TemplateType};
use super::sla::SlaMetrics;
use super::stats::FileStats;
use std::collections::BTreeMap;

/// Hand-built analysis with one row per order id and the given failure reasons.
pub(crate) fn analysis(
    agency: &str,
    file_name: &str,
    order_ids: &[&str],
    reasons: &[&str],
) -> FileAnalysis {
    let total_rows = order_ids.len();
    let failure_count = reasons.len().min(total_rows);
    FileAnalysis {
        agency: agency.to_string(),
        ehr: "Unknown".to_string(),
        file_name: file_name.to_string(),
        template_type: TemplateType::from_file_name(file_name),
        pair_key: derive_pair_key(file_name),
        stats: FileStats {
            total_rows,
            success_count: total_rows - failure_count,
            failure_count,
            signed_count: 0,
            unsigned_count: total_rows,
            success_rate: "100.0%".to_string(),
            failure_rate: "0.0%".to_string(),
            unique_failure_reasons: reasons.iter().map(|reason| reason.to_string()).collect(),
            failure_reason_counts: reasons
                .iter()
                .map(|reason| (reason.to_string(), 1))
                .collect(),
            failure_details: BTreeMap::new(),
            inspected_status_columns: Vec::new(),
            sla: SlaMetrics::default(),
        },
        order_ids: order_ids.iter().map(|id| id.to_string()).collect(),
    }
}
