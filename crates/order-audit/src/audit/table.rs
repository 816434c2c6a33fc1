use super::error::AuditError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

const DATE_TIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"];

/// A single cell of an export. Missing cells are represented as `None` by the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellValue {
    Text(String),
    Date(NaiveDateTime),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// String form used for pattern matching and identifiers.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            CellValue::Text(value) => Cow::Borrowed(value.as_str()),
            CellValue::Date(value) => Cow::Owned(value.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Text(value) => parse_cell_datetime(value),
            CellValue::Date(value) => Some(*value),
        }
    }
}

/// Schema-flexible table: an ordered column list plus rows of optional cells.
///
/// Column sets differ between exports, so every lookup goes through
/// [`Table::column_index`] and callers must handle absent columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Option<CellValue>>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for column in columns {
            table.add_column(column.into());
        }
        table
    }

    /// Convenience constructor for text-only tables.
    pub fn from_text_rows(columns: &[&str], rows: Vec<Vec<Option<&str>>>) -> Self {
        let mut table = Self::new(columns.iter().copied());
        for row in rows {
            table.push_row(
                row.into_iter()
                    .map(|cell| cell.map(CellValue::text))
                    .collect(),
            );
        }
        table
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, AuditError> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Reads a CSV export with a header row. Blank cells become missing values and
    /// rows shorter than the header are padded; an empty input yields an empty table.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, AuditError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let mut table = Self::new(headers.iter().map(normalize_header));

        for record in csv_reader.records() {
            let record = record?;
            let cells = record
                .iter()
                .map(|value| {
                    if value.trim().is_empty() {
                        None
                    } else {
                        Some(CellValue::text(value))
                    }
                })
                .collect();
            table.push_row(cells);
        }

        Ok(table)
    }

    pub fn push_row(&mut self, mut cells: Vec<Option<CellValue>>) {
        cells.resize(self.columns.len(), None);
        self.rows.push(cells);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|cells| cells.get(column)).and_then(Option::as_ref)
    }

    /// Cell text with missing values coerced to the empty string.
    pub fn cell_text(&self, row: usize, column: usize) -> Cow<'_, str> {
        self.cell(row, column)
            .map(CellValue::as_text)
            .unwrap_or(Cow::Borrowed(""))
    }

    pub fn cell_datetime(&self, row: usize, column: usize) -> Option<NaiveDateTime> {
        self.cell(row, column).and_then(CellValue::as_datetime)
    }

    /// Every cell of a row joined with single spaces, missing cells as empty strings.
    pub fn row_text(&self, row: usize) -> String {
        (0..self.columns.len())
            .map(|column| self.cell_text(row, column))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn add_column(&mut self, name: String) {
        let mut candidate = name.clone();
        let mut suffix = 1;
        while self.index.contains_key(&candidate) {
            candidate = format!("{name}.{suffix}");
            suffix += 1;
        }
        self.index.insert(candidate.clone(), self.columns.len());
        self.columns.push(candidate);
        for row in &mut self.rows {
            row.push(None);
        }
    }
}

fn normalize_header(value: &str) -> String {
    value.replace(['\u{feff}', '\u{200b}'], "").trim().to_string()
}

/// Lenient date parsing; anything unrecognised is treated as absent.
pub(crate) fn parse_cell_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}
