use super::rules::ColumnLayout;
use super::table::Table;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PENDING_OVERDUE_DAYS: u32 = 5;

/// Sign-latency statistics for one export.
///
/// Every field is `None` when the table lacks either date column; that differs from a
/// table that has the columns but no pending rows, where `pending_overdue_count` is 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlaMetrics {
    pub average_days_to_sign: Option<f64>,
    pub max_days_to_sign: Option<i64>,
    pub min_days_to_sign: Option<i64>,
    pub pending_overdue_count: Option<usize>,
}

pub fn compute_sla(
    table: &Table,
    layout: &ColumnLayout,
    overdue_threshold_days: u32,
    now: NaiveDateTime,
) -> SlaMetrics {
    let (Some(sent_index), Some(signed_index)) = (
        table.column_index(layout.sent_column()),
        table.column_index(layout.signature_column()),
    ) else {
        return SlaMetrics::default();
    };

    let mut latencies = Vec::new();
    let mut pending_overdue_count = 0;

    for row in 0..table.len() {
        let sent = table.cell_datetime(row, sent_index);
        let signed = table.cell_datetime(row, signed_index);

        match (sent, signed) {
            (Some(sent), Some(signed)) => latencies.push(whole_days(signed - sent)),
            (Some(sent), None) => {
                if whole_days(now - sent) > i64::from(overdue_threshold_days) {
                    pending_overdue_count += 1;
                }
            }
            _ => {}
        }
    }

    if latencies.is_empty() {
        return SlaMetrics {
            pending_overdue_count: Some(pending_overdue_count),
            ..SlaMetrics::default()
        };
    }

    let total: i64 = latencies.iter().sum();
    let average = total as f64 / latencies.len() as f64;

    SlaMetrics {
        // Ties go to the even hundredth, so 0.125 reports as 0.12.
        average_days_to_sign: Some((average * 100.0).round_ties_even() / 100.0),
        max_days_to_sign: latencies.iter().max().copied(),
        min_days_to_sign: latencies.iter().min().copied(),
        pending_overdue_count: Some(pending_overdue_count),
    }
}

/// Whole days, floored, so a negative partial day counts as -1.
fn whole_days(duration: Duration) -> i64 {
    duration.num_seconds().div_euclid(86_400)
}
