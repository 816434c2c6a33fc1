use super::table::Table;
use regex::{Regex, RegexBuilder};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Case-insensitive alternation over a keyword set.
#[derive(Debug, Clone)]
pub struct FailurePattern {
    regex: Arc<Regex>,
}

impl FailurePattern {
    pub fn compile(keywords: &BTreeSet<String>) -> Result<Self, regex::Error> {
        let alternation = keywords
            .iter()
            .map(|keyword| regex::escape(keyword))
            .collect::<Vec<_>>()
            .join("|");
        let regex = RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            regex: Arc::new(regex),
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Process-lifetime memo of compiled patterns keyed by the sorted keyword set.
///
/// Reads take a shared lock; the write lock is only taken on a miss.
#[derive(Debug, Default)]
pub struct PatternCache {
    patterns: RwLock<HashMap<Vec<String>, FailurePattern>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(&self, keywords: &BTreeSet<String>) -> Result<FailurePattern, regex::Error> {
        let key: Vec<String> = keywords.iter().cloned().collect();

        if let Some(pattern) = self
            .patterns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(pattern.clone());
        }

        let pattern = FailurePattern::compile(keywords)?;
        debug!(keywords = key.len(), "compiled failure pattern");

        let mut guard = self.patterns.write().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.entry(key).or_insert(pattern).clone())
    }

    pub fn len(&self) -> usize {
        self.patterns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-row failure flags plus the status columns that were present in the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureMask {
    flags: Vec<bool>,
    inspected_columns: Vec<String>,
}

impl FailureMask {
    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    pub fn inspected_columns(&self) -> &[String] {
        &self.inspected_columns
    }

    pub fn is_failed(&self, row: usize) -> bool {
        self.flags.get(row).copied().unwrap_or(false)
    }

    pub fn failure_count(&self) -> usize {
        self.flags.iter().filter(|flag| **flag).count()
    }

    /// Row positions flagged as failed, in table order.
    pub fn failed_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.flags
            .iter()
            .enumerate()
            .filter_map(|(row, flag)| flag.then_some(row))
    }
}

/// Flags rows whose status columns, or whole-row text, match the failure pattern.
///
/// Status columns missing from this table are skipped. The whole-row scan catches
/// failure text in columns the agency rule does not enumerate.
pub fn build_failure_mask(
    table: &Table,
    pattern: &FailurePattern,
    status_columns: &[String],
) -> FailureMask {
    if table.is_empty() {
        return FailureMask::default();
    }

    let mut flags = vec![false; table.len()];
    let mut inspected_columns = Vec::new();

    for column in status_columns {
        let Some(index) = table.column_index(column) else {
            continue;
        };
        inspected_columns.push(column.clone());

        for (row, flag) in flags.iter_mut().enumerate() {
            if !*flag && pattern.is_match(&table.cell_text(row, index)) {
                *flag = true;
            }
        }
    }

    for (row, flag) in flags.iter_mut().enumerate() {
        if !*flag && pattern.is_match(&table.row_text(row)) {
            *flag = true;
        }
    }

    FailureMask {
        flags,
        inspected_columns,
    }
}
