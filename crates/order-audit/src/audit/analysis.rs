use super::stats::FileStats;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Checked in order; the first marker found in the base name wins.
const PAIR_KEY_MARKERS: [&str; 7] = [
    "_signedordertemplate",
    "_unsignedordertemplate",
    "_signedorder",
    "_unsignedorder",
    "_signed",
    "_unsigned",
    "_ordertemplate",
];

const KNOWN_EHRS: [(&str, &str); 3] = [
    ("axxess", "Axxess"),
    ("kinnser", "Kinnser"),
    ("athena", "Athena"),
];

static AGENCY_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Axxess|Kinnser|Athena|WellSky|HCHB)-([^_]+)")
        .expect("invalid agency segment pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    Signed,
    Unsigned,
    Mixed,
}

impl TemplateType {
    /// Classifies a file name. "unsigned" is checked first because it contains "signed".
    pub fn from_file_name(file_name: &str) -> Self {
        let lowered = file_name.to_lowercase();
        if lowered.contains("unsigned") {
            Self::Unsigned
        } else if lowered.contains("signed") {
            Self::Signed
        } else {
            Self::Mixed
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Signed => "signed",
            Self::Unsigned => "unsigned",
            Self::Mixed => "mixed",
        }
    }
}

/// Analysis of one export: metadata, statistics, and the order identifiers it lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub agency: String,
    pub ehr: String,
    pub file_name: String,
    pub template_type: TemplateType,
    pub pair_key: String,
    pub stats: FileStats,
    pub order_ids: BTreeSet<String>,
}

/// Grouping key shared by a signed export and its unsigned counterpart.
///
/// The extension is dropped, then the base name is cut at the first known marker and
/// trailing separators are trimmed. An empty result keeps the untouched base name.
pub fn derive_pair_key(file_name: &str) -> String {
    let base_name = strip_extension(file_name);
    let lowered = base_name.to_ascii_lowercase();

    for marker in PAIR_KEY_MARKERS {
        if let Some(position) = lowered.find(marker) {
            let stem = base_name[..position].trim_end_matches(['-', '_', ' ']);
            return if stem.is_empty() {
                base_name.to_string()
            } else {
                stem.to_string()
            };
        }
    }

    base_name.to_string()
}

/// Agency named in an export's file name, e.g. `Axxess-Luna-Vista_...` -> `Luna Vista`.
pub fn infer_agency_from_filename(file_name: &str) -> String {
    if let Some(segment) = AGENCY_SEGMENT
        .captures(file_name)
        .and_then(|captures| captures.get(1))
    {
        return segment.as_str().replace('-', " ");
    }

    infer_ehr_from_filename(file_name)
}

pub fn infer_ehr_from_filename(file_name: &str) -> String {
    let lowered = file_name.to_lowercase();
    KNOWN_EHRS
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(position) if file_name[..position].trim_start_matches('.').is_empty() => file_name,
        Some(position) => &file_name[..position],
        None => file_name,
    }
}
