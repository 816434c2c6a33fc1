use super::analysis::{FileAnalysis, TemplateType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Agency-wide comparison of unsigned and signed order identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub agency: String,
    pub unsigned_total: usize,
    pub signed_total: usize,
    pub pending_signature_orders: Vec<String>,
    pub signed_without_unsigned_source: Vec<String>,
}

#[derive(Default)]
struct AgencyOrders<'a> {
    signed: BTreeSet<&'a str>,
    unsigned: BTreeSet<&'a str>,
}

/// Unions order identifiers per agency across the whole batch.
///
/// Unlike pairing, mixed files are ignored here, and an agency that only has mixed
/// files gets no entry.
pub fn build_reconciliation(analyses: &[FileAnalysis]) -> Vec<ReconciliationEntry> {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, AgencyOrders<'_>> = HashMap::new();

    for entry in analyses {
        if entry.template_type == TemplateType::Mixed {
            continue;
        }

        let orders = grouped.entry(entry.agency.as_str()).or_insert_with(|| {
            order.push(entry.agency.as_str());
            AgencyOrders::default()
        });
        let ids = entry.order_ids.iter().map(String::as_str);
        match entry.template_type {
            TemplateType::Signed => orders.signed.extend(ids),
            TemplateType::Unsigned => orders.unsigned.extend(ids),
            TemplateType::Mixed => {}
        }
    }

    order
        .into_iter()
        .filter_map(|agency| {
            let orders = grouped.remove(agency)?;
            Some(ReconciliationEntry {
                agency: agency.to_string(),
                unsigned_total: orders.unsigned.len(),
                signed_total: orders.signed.len(),
                pending_signature_orders: orders
                    .unsigned
                    .difference(&orders.signed)
                    .map(|id| id.to_string())
                    .collect(),
                signed_without_unsigned_source: orders
                    .signed
                    .difference(&orders.unsigned)
                    .map(|id| id.to_string())
                    .collect(),
            })
        })
        .collect()
}
