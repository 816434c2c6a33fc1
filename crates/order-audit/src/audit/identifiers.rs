use super::table::Table;
use std::collections::BTreeSet;

/// Spreadsheet row numbers are 1-based and sit below a header row.
const SPREADSHEET_ROW_OFFSET: usize = 2;

/// Order identifiers taken from the first candidate column present in the table.
///
/// Only that column is read, even if later candidates also exist. Values are trimmed
/// and blanks are dropped.
pub fn extract_identifiers(table: &Table, identifier_columns: &[String]) -> BTreeSet<String> {
    let Some(index) = identifier_columns
        .iter()
        .find_map(|column| table.column_index(column))
    else {
        return BTreeSet::new();
    };

    (0..table.len())
        .map(|row| table.cell_text(row, index).trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Display identifier for one row: the first non-blank identifier cell, else `Row N`.
pub(crate) fn row_identifier(table: &Table, row: usize, identifier_columns: &[String]) -> String {
    identifier_columns
        .iter()
        .filter_map(|column| table.column_index(column))
        .map(|index| table.cell_text(row, index).trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| format!("Row {}", row + SPREADSHEET_ROW_OFFSET))
}
