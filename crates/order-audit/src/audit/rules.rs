use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

pub const DEFAULT_FAILURE_KEYWORDS: [&str; 5] =
    ["not valid", "failed", "error", "mandatory", "missing"];

pub const DEFAULT_STATUS_COLUMNS: [&str; 6] = [
    "Remarks",
    "Sent To Physician Status",
    "WAV Document Upload Status",
    "Signed By Physician Status",
    "Uploaded Signed Order Status",
    "Order Upload Status",
];

pub const DEFAULT_IDENTIFIER_COLUMNS: [&str; 3] = ["OrderId", "Order Number", "Document Id"];
pub const SIGNATURE_COLUMN: &str = "Signed By Physician Date";
pub const SENT_TO_PHYSICIAN_COLUMN: &str = "Sent To Physician Date";
pub const REMARKS_COLUMN: &str = "Remarks";

/// Failure keywords and the status columns inspected for one agency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgencyRule {
    failure_keywords: BTreeSet<String>,
    status_columns: Vec<String>,
}

impl AgencyRule {
    /// Builds a rule, rejecting empty or blank keyword sets. Status columns keep their
    /// order; repeated names are collapsed to their first occurrence.
    pub fn new<K, C>(failure_keywords: K, status_columns: C) -> Result<Self, RuleError>
    where
        K: IntoIterator,
        K::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let failure_keywords: BTreeSet<String> =
            failure_keywords.into_iter().map(Into::into).collect();
        if failure_keywords.is_empty() {
            return Err(RuleError::EmptyKeywords);
        }
        if failure_keywords.iter().any(|keyword| keyword.trim().is_empty()) {
            return Err(RuleError::BlankKeyword);
        }

        Ok(Self {
            failure_keywords,
            status_columns: dedupe_columns(status_columns.into_iter().map(Into::into).collect()),
        })
    }

    pub fn standard() -> Self {
        Self {
            failure_keywords: DEFAULT_FAILURE_KEYWORDS
                .iter()
                .map(|keyword| keyword.to_string())
                .collect(),
            status_columns: DEFAULT_STATUS_COLUMNS
                .iter()
                .map(|column| column.to_string())
                .collect(),
        }
    }

    /// Sorted, deduplicated keyword set.
    pub fn failure_keywords(&self) -> &BTreeSet<String> {
        &self.failure_keywords
    }

    pub fn status_columns(&self) -> &[String] {
        &self.status_columns
    }
}

/// Column names the engine reads besides the per-agency status columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    identifier_columns: Vec<String>,
    signature_column: String,
    sent_column: String,
    remarks_column: String,
}

impl ColumnLayout {
    pub fn new<I>(
        identifier_columns: I,
        signature_column: impl Into<String>,
        sent_column: impl Into<String>,
        remarks_column: impl Into<String>,
    ) -> Result<Self, RuleError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let identifier_columns: Vec<String> =
            identifier_columns.into_iter().map(Into::into).collect();
        if identifier_columns.is_empty() {
            return Err(RuleError::EmptyIdentifierColumns);
        }

        Ok(Self {
            identifier_columns,
            signature_column: signature_column.into(),
            sent_column: sent_column.into(),
            remarks_column: remarks_column.into(),
        })
    }

    /// Candidate identifier columns in priority order.
    pub fn identifier_columns(&self) -> &[String] {
        &self.identifier_columns
    }

    pub fn signature_column(&self) -> &str {
        &self.signature_column
    }

    pub fn sent_column(&self) -> &str {
        &self.sent_column
    }

    pub fn remarks_column(&self) -> &str {
        &self.remarks_column
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            identifier_columns: DEFAULT_IDENTIFIER_COLUMNS
                .iter()
                .map(|column| column.to_string())
                .collect(),
            signature_column: SIGNATURE_COLUMN.to_string(),
            sent_column: SENT_TO_PHYSICIAN_COLUMN.to_string(),
            remarks_column: REMARKS_COLUMN.to_string(),
        }
    }
}

/// Explicit agency-rule registry handed to the engine at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRules {
    default_rule: AgencyRule,
    agencies: HashMap<String, AgencyRule>,
    layout: ColumnLayout,
}

impl AuditRules {
    /// Registry with the built-in Axxess and Kinnser rules.
    pub fn standard() -> Self {
        let mut axxess_keywords: Vec<&str> = DEFAULT_FAILURE_KEYWORDS.to_vec();
        axxess_keywords.extend(["no patient", "non da"]);
        let axxess = AgencyRule {
            failure_keywords: axxess_keywords.into_iter().map(String::from).collect(),
            status_columns: AgencyRule::standard().status_columns,
        };

        let mut kinnser_columns: Vec<String> = AgencyRule::standard().status_columns;
        kinnser_columns.push("Order Upload Status".to_string());
        let kinnser = AgencyRule {
            failure_keywords: AgencyRule::standard().failure_keywords,
            status_columns: dedupe_columns(kinnser_columns),
        };

        Self::new(AgencyRule::standard(), ColumnLayout::default())
            .with_agency("axxess", axxess)
            .with_agency("kinnser", kinnser)
    }

    pub fn new(default_rule: AgencyRule, layout: ColumnLayout) -> Self {
        Self {
            default_rule,
            agencies: HashMap::new(),
            layout,
        }
    }

    /// Registers or replaces the rule for an agency; names are case-insensitive.
    pub fn with_agency(mut self, agency: &str, rule: AgencyRule) -> Self {
        self.agencies.insert(agency.trim().to_lowercase(), rule);
        self
    }

    pub fn with_layout(mut self, layout: ColumnLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Applies a JSON object of `{agency: {failure_keywords, status_columns}}` overrides.
    pub fn apply_overrides_json(&mut self, payload: &str) -> Result<usize, RuleError> {
        let overrides: HashMap<String, AgencyRuleOverride> = serde_json::from_str(payload)?;
        let count = overrides.len();

        for (agency, entry) in overrides {
            let rule = AgencyRule::new(entry.failure_keywords, entry.status_columns).map_err(
                |source| RuleError::Agency {
                    agency: agency.clone(),
                    source: Box::new(source),
                },
            )?;
            self.agencies.insert(agency.trim().to_lowercase(), rule);
        }

        Ok(count)
    }

    /// Rule for an agency, falling back to the default rule when unrecognised.
    pub fn resolve(&self, agency: &str) -> &AgencyRule {
        self.agencies
            .get(&agency.trim().to_lowercase())
            .unwrap_or(&self.default_rule)
    }

    pub fn default_rule(&self) -> &AgencyRule {
        &self.default_rule
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub(crate) fn all_rules(&self) -> impl Iterator<Item = &AgencyRule> {
        std::iter::once(&self.default_rule).chain(self.agencies.values())
    }
}

impl Default for AuditRules {
    fn default() -> Self {
        Self::standard()
    }
}

fn dedupe_columns(columns: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    columns
        .into_iter()
        .filter(|column| seen.insert(column.clone()))
        .collect()
}

#[derive(Debug, Deserialize)]
struct AgencyRuleOverride {
    failure_keywords: Vec<String>,
    #[serde(default = "default_status_columns")]
    status_columns: Vec<String>,
}

fn default_status_columns() -> Vec<String> {
    DEFAULT_STATUS_COLUMNS
        .iter()
        .map(|column| column.to_string())
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("agency rule requires at least one failure keyword")]
    EmptyKeywords,
    #[error("failure keywords must not be blank")]
    BlankKeyword,
    #[error("identifier column list must not be empty")]
    EmptyIdentifierColumns,
    #[error("agency rule for '{agency}' is invalid: {source}")]
    Agency {
        agency: String,
        source: Box<RuleError>,
    },
    #[error("agency rule overrides are not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}
