use crate::infra::parse_threshold;
use chrono::Utc;
use clap::Args;
use order_audit::audit::{AuditEngine, AuditFile, BatchResult, FileAnalysis, Table};
use order_audit::config::AppConfig;
use order_audit::error::AppError;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub(crate) struct AuditArgs {
    /// Order export CSV files to audit, in batch order
    #[arg(required = true)]
    pub(crate) files: Vec<PathBuf>,
    /// Agency applied to every file (inferred from each file name when omitted)
    #[arg(long)]
    pub(crate) agency: Option<String>,
    /// Failure-rate percentage at or above which a file raises an alert
    #[arg(long, value_parser = parse_threshold)]
    pub(crate) alert_threshold: Option<f64>,
    /// Print the batch result as JSON instead of a text report
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_audit(args: AuditArgs) -> Result<(), AppError> {
    let AuditArgs {
        files,
        agency,
        alert_threshold,
        json,
    } = args;

    let config = AppConfig::load()?;
    let engine = AuditEngine::new(
        config.audit.rules,
        config.audit.pending_overdue_threshold_days,
    )?;
    let threshold = alert_threshold.unwrap_or(config.audit.alert_failure_threshold);

    let files = load_audit_files(&files, agency.as_deref())?;
    let batch = engine.run_batch(&files, threshold, Utc::now())?;

    if json {
        let payload = serde_json::to_string_pretty(&batch)
            .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
        println!("{payload}");
    } else {
        render_batch_report(&batch, threshold);
    }

    Ok(())
}

pub(crate) fn load_audit_files(
    paths: &[PathBuf],
    agency: Option<&str>,
) -> Result<Vec<AuditFile>, AppError> {
    paths
        .iter()
        .map(|path| {
            let table = Table::from_path(path)?;
            let file = AuditFile::new(file_name(path), table);
            Ok::<_, AppError>(match agency {
                Some(agency) => file.with_agency(agency),
                None => file,
            })
        })
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn render_batch_report(batch: &BatchResult, threshold: f64) {
    println!("Order export audit {}", batch.audit_id);
    println!(
        "Audited {} file(s) at {}",
        batch.audit_results.len(),
        batch.audit_timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );

    println!("\nFiles");
    for analysis in &batch.audit_results {
        render_file(analysis);
    }

    if batch.paired_results.is_empty() {
        println!("\nPairs: none");
    } else {
        println!("\nPairs");
        for pair in &batch.paired_results {
            let summary = &pair.combined_summary;
            println!(
                "- {} / {}: {} unsigned, {} signed documents",
                pair.agency,
                pair.pair_key,
                summary.documents_processed.unsigned,
                summary.documents_processed.signed
            );
            println!(
                "  Pending signature: {} | Signed without unsigned source: {}",
                summary.pending_signature_orders.len(),
                summary.signed_without_unsigned_source.len()
            );
            if !summary.dominant_failure_reasons.is_empty() {
                println!(
                    "  Dominant reasons: {}",
                    summary.dominant_failure_reasons.join("; ")
                );
            }
        }
    }

    if batch.reconciliation_summary.is_empty() {
        println!("\nReconciliation: none");
    } else {
        println!("\nReconciliation");
        for entry in &batch.reconciliation_summary {
            println!(
                "- {}: {} unsigned, {} signed, {} pending, {} without source",
                entry.agency,
                entry.unsigned_total,
                entry.signed_total,
                entry.pending_signature_orders.len(),
                entry.signed_without_unsigned_source.len()
            );
        }
    }

    if batch.alerts.is_empty() {
        println!("\nAlerts (>= {threshold:.1}% failures): none");
    } else {
        println!("\nAlerts (>= {threshold:.1}% failures)");
        for alert in &batch.alerts {
            println!(
                "- {} [{}]: {} failed",
                alert.file_name, alert.agency, alert.failure_rate
            );
        }
    }
}

fn render_file(analysis: &FileAnalysis) {
    let stats = &analysis.stats;
    println!(
        "- {} ({}, {}, {}): {} rows, {} failed ({}), {} signed",
        analysis.file_name,
        analysis.agency,
        analysis.ehr,
        analysis.template_type.label(),
        stats.total_rows,
        stats.failure_count,
        stats.failure_rate,
        stats.signed_count
    );

    match stats.sla.average_days_to_sign {
        Some(average) => println!(
            "  Days to sign: avg {average:.2}, min {}, max {} | overdue pending {}",
            stats.sla.min_days_to_sign.unwrap_or_default(),
            stats.sla.max_days_to_sign.unwrap_or_default(),
            stats.sla.pending_overdue_count.unwrap_or_default()
        ),
        None => {
            if let Some(pending) = stats.sla.pending_overdue_count {
                println!("  Overdue pending signatures: {pending}");
            }
        }
    }

    for reason in stats.unique_failure_reasons.iter().take(5) {
        let count = stats.failure_reason_counts.get(reason).copied().unwrap_or_default();
        println!("  * {reason} ({count})");
    }
}
