use super::analysis::{FileAnalysis, TemplateType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

const DOMINANT_REASON_LIMIT: usize = 5;

/// A signed export matched with its unsigned counterpart for one agency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairResult {
    pub pair_key: String,
    pub agency: String,
    pub signed: Option<FileAnalysis>,
    pub unsigned: Option<FileAnalysis>,
    pub combined_summary: CombinedSummary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentsProcessed {
    pub signed: usize,
    pub unsigned: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedSummary {
    pub documents_processed: DocumentsProcessed,
    pub failure_rate_unsigned: Option<String>,
    pub failure_rate_signed: Option<String>,
    pub success_rate_unsigned: Option<String>,
    pub success_rate_signed: Option<String>,
    pub pending_signature_orders: Vec<String>,
    pub signed_without_unsigned_source: Vec<String>,
    pub dominant_failure_reasons: Vec<String>,
}

impl CombinedSummary {
    pub fn from_entries(signed: Option<&FileAnalysis>, unsigned: Option<&FileAnalysis>) -> Self {
        let empty = BTreeSet::new();
        let signed_ids = signed.map_or(&empty, |entry| &entry.order_ids);
        let unsigned_ids = unsigned.map_or(&empty, |entry| &entry.order_ids);

        let mut seen = HashSet::new();
        let dominant_failure_reasons = unsigned
            .into_iter()
            .chain(signed)
            .flat_map(|entry| entry.stats.unique_failure_reasons.iter())
            .filter(|reason| seen.insert(reason.as_str()))
            .take(DOMINANT_REASON_LIMIT)
            .cloned()
            .collect();

        Self {
            documents_processed: DocumentsProcessed {
                signed: signed.map_or(0, |entry| entry.stats.total_rows),
                unsigned: unsigned.map_or(0, |entry| entry.stats.total_rows),
            },
            failure_rate_unsigned: unsigned.map(|entry| entry.stats.failure_rate.clone()),
            failure_rate_signed: signed.map(|entry| entry.stats.failure_rate.clone()),
            success_rate_unsigned: unsigned.map(|entry| entry.stats.success_rate.clone()),
            success_rate_signed: signed.map(|entry| entry.stats.success_rate.clone()),
            pending_signature_orders: unsigned_ids.difference(signed_ids).cloned().collect(),
            signed_without_unsigned_source: signed_ids.difference(unsigned_ids).cloned().collect(),
            dominant_failure_reasons,
        }
    }
}

#[derive(Default)]
struct PairSlots<'a> {
    signed: Option<&'a FileAnalysis>,
    unsigned: Option<&'a FileAnalysis>,
}

/// Groups analyses by `(agency, pair_key)` in first-seen order.
///
/// Only `signed` files fill the signed slot; unsigned and mixed files fill the unsigned
/// slot. A later file for an occupied slot replaces the earlier one.
pub fn build_pairs(analyses: &[FileAnalysis]) -> Vec<PairResult> {
    let mut order: Vec<(&str, &str)> = Vec::new();
    let mut slots: HashMap<(&str, &str), PairSlots<'_>> = HashMap::new();

    for entry in analyses {
        let key = (entry.agency.as_str(), entry.pair_key.as_str());
        let slot = slots.entry(key).or_insert_with(|| {
            order.push(key);
            PairSlots::default()
        });

        match entry.template_type {
            TemplateType::Signed => slot.signed = Some(entry),
            TemplateType::Unsigned | TemplateType::Mixed => slot.unsigned = Some(entry),
        }
    }

    order
        .into_iter()
        .filter_map(|key| {
            let slot = slots.remove(&key)?;
            if slot.signed.is_none() && slot.unsigned.is_none() {
                return None;
            }
            Some(PairResult {
                pair_key: key.1.to_string(),
                agency: key.0.to_string(),
                signed: slot.signed.cloned(),
                unsigned: slot.unsigned.cloned(),
                combined_summary: CombinedSummary::from_entries(slot.signed, slot.unsigned),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::test_support::analysis;

    #[test]
    fn pairs_signed_and_unsigned_counterparts() {
        let analyses = vec![
            analysis("Luna", "Luna_Signed.csv", &["A", "B"], &[]),
            analysis("Luna", "Luna_Unsigned.csv", &["B", "C"], &[]),
        ];

        let pairs = build_pairs(&analyses);

        assert_eq!(pairs.len(), 1);
        let summary = &pairs[0].combined_summary;
        assert_eq!(pairs[0].pair_key, "Luna");
        assert_eq!(summary.pending_signature_orders, vec!["C".to_string()]);
        assert_eq!(summary.signed_without_unsigned_source, vec!["A".to_string()]);
        assert_eq!(summary.documents_processed, DocumentsProcessed { signed: 2, unsigned: 2 });
        assert!(summary.failure_rate_signed.is_some());
    }

    #[test]
    fn mixed_files_fill_unsigned_slot_and_later_files_overwrite() {
        let analyses = vec![
            analysis("Luna", "Luna_Unsigned.csv", &["1"], &[]),
            analysis("Luna", "Luna.csv", &["2"], &[]),
        ];

        let pairs = build_pairs(&analyses);

        assert_eq!(pairs.len(), 1);
        let unsigned = pairs[0].unsigned.as_ref().expect("unsigned slot filled");
        assert_eq!(unsigned.file_name, "Luna.csv");
        assert!(pairs[0].signed.is_none());
        assert_eq!(pairs[0].combined_summary.failure_rate_signed, None);
        assert_eq!(pairs[0].combined_summary.documents_processed.signed, 0);
    }

    #[test]
    fn pairs_keep_first_seen_order_and_separate_agencies() {
        let analyses = vec![
            analysis("Beta", "Beta_Signed.csv", &[], &[]),
            analysis("Alpha", "Shared_Signed.csv", &[], &[]),
            analysis("Gamma", "Shared_Signed.csv", &[], &[]),
            analysis("Beta", "Beta_Unsigned.csv", &[], &[]),
        ];

        let pairs = build_pairs(&analyses);

        let keys: Vec<(&str, &str)> = pairs
            .iter()
            .map(|pair| (pair.agency.as_str(), pair.pair_key.as_str()))
            .collect();
        assert_eq!(keys, vec![("Beta", "Beta"), ("Alpha", "Shared"), ("Gamma", "Shared")]);
    }

    #[test]
    fn dominant_reasons_list_unsigned_first_and_cap_at_five() {
        let analyses = vec![
            analysis("Luna", "Luna_Signed.csv", &[], &["s1", "shared", "s2"]),
            analysis("Luna", "Luna_Unsigned.csv", &[], &["u1", "shared", "u2", "u3"]),
        ];

        let pairs = build_pairs(&analyses);

        assert_eq!(
            pairs[0].combined_summary.dominant_failure_reasons,
            vec!["u1", "shared", "u2", "u3", "s1"]
        );
    }
}
