//! In-memory tabular dataset and the upload loader
//!
//! A `Dataset` is a named rows-by-columns table built once per request from
//! uploaded bytes. Column order and row order are preserved for display;
//! later pipeline stages only read it or produce filtered copies, never
//! mutate it in place.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::error::{Error, Result};

/// A single table cell.
///
/// Cells are typed at load time: anything that parses as a float becomes a
/// `Number`, blank cells become `Empty`, everything else stays `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Parse raw text into the most specific cell type
    pub fn parse(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(raw.to_string()),
        }
    }

    /// Numeric coercion: numbers pass through, text is parsed on demand,
    /// everything else is missing
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Cell::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// String-cast used for display and for filter comparison. Integral
    /// numbers render without a trailing `.0` so that a client-supplied
    /// `"1"` matches a numeric column.
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => format_number(*n),
            Cell::Text(s) => s.clone(),
        }
    }
}

/// Render a float the way a CSV-sourced value would read back
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// A named, column-ordered table
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Dataset {
    /// Build a dataset; rows are padded or truncated to the header width
    pub fn new(name: impl Into<String>, columns: Vec<String>, mut rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        for row in &mut rows {
            row.resize(width, Cell::Empty);
        }
        Dataset {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Exact-name column lookup
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.rows[row][col]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// All cells of a column, in row order
    pub fn column_cells(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Numeric coercion of a column; non-numeric cells become `None`
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_number()).collect())
    }

    /// True when every non-missing cell of the column is numeric and at
    /// least one value is present
    pub fn is_numeric_column(&self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        let mut seen = false;
        for row in &self.rows {
            match &row[idx] {
                Cell::Empty => {}
                cell => {
                    if cell.as_number().is_none() {
                        return false;
                    }
                    seen = true;
                }
            }
        }
        seen
    }

    /// Names of columns whose populated cells are all numeric
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| self.is_numeric_column(c))
            .cloned()
            .collect()
    }

    /// Filtered copy keeping rows for which `keep` returns true
    pub fn filter_rows<F>(&self, keep: F) -> Dataset
    where
        F: Fn(usize) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(i, _)| keep(*i))
            .map(|(_, r)| r.clone())
            .collect();
        Dataset {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Copy with an extra (or replaced) column appended
    pub fn with_column(&self, name: impl Into<String>, values: Vec<Cell>) -> Dataset {
        let name = name.into();
        let mut out = self.clone();
        if let Some(idx) = out.column_index(&name) {
            for (row, value) in out.rows.iter_mut().zip(values) {
                row[idx] = value;
            }
        } else {
            out.columns.push(name);
            let mut values = values;
            values.resize(out.rows.len(), Cell::Empty);
            for (row, value) in out.rows.iter_mut().zip(values) {
                row.push(value);
            }
        }
        out
    }

}

const CSV_EXTENSIONS: &[&str] = &["csv", ""];
const EXCEL_EXTENSIONS: &[&str] = &["xls", "xlsx"];
const DELIMITER_CANDIDATES: &[u8] = &[b';', b',', b'|', b'\t'];

/// Parse uploaded bytes into a `Dataset`, auto-detecting the format.
///
/// CSV-like input (extension `.csv` or none) has its delimiter sniffed from
/// the first ~1KB; `.xls`/`.xlsx` go through the workbook reader. Any other
/// extension is rejected before touching the content. Dimension limits are
/// enforced immediately after parsing.
pub fn load(
    data: &[u8],
    filename: Option<&str>,
    name: &str,
    max_rows: usize,
    max_columns: usize,
) -> Result<Dataset> {
    let extension = filename
        .and_then(|f| f.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()))
        .unwrap_or_default();

    let dataset = if EXCEL_EXTENSIONS.contains(&extension.as_str()) {
        read_workbook(data, name)?
    } else if CSV_EXTENSIONS.contains(&extension.as_str()) {
        let delimiter = detect_delimiter(&data[..data.len().min(1024)]);
        read_csv(data, delimiter, name)?
    } else {
        return Err(Error::UnsupportedFileType(format!(".{}", extension)));
    };

    enforce_dimensions(&dataset, max_rows, max_columns)?;
    Ok(dataset)
}

/// Reject datasets exceeding the configured shape limits
pub fn enforce_dimensions(dataset: &Dataset, max_rows: usize, max_columns: usize) -> Result<()> {
    if dataset.row_count() > max_rows || dataset.column_count() > max_columns {
        return Err(Error::DatasetTooLarge {
            rows: dataset.row_count(),
            columns: dataset.column_count(),
            max_rows,
            max_columns,
        });
    }
    Ok(())
}

/// Sniff the delimiter from a content sample: the candidate splitting the
/// first non-empty line most often wins, comma as fallback.
fn detect_delimiter(sample: &[u8]) -> u8 {
    let text = String::from_utf8_lossy(sample);
    let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");

    let mut best = b',';
    let mut best_count = 0usize;
    for &candidate in DELIMITER_CANDIDATES {
        let count = first_line.bytes().filter(|&b| b == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

fn read_csv(data: &[u8], delimiter: u8, name: &str) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::payload(format!("Failed to parse CSV header: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::payload(format!("Failed to parse CSV row: {}", e)))?;
        rows.push(record.iter().map(Cell::parse).collect());
    }

    Ok(Dataset::new(name, headers, rows))
}

fn read_workbook(data: &[u8], name: &str) -> Result<Dataset> {
    let cursor = Cursor::new(data.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| Error::payload(format!("Failed to open workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::payload("Workbook contains no sheets".to_string()))?
        .map_err(|e| Error::payload(format!("Failed to read workbook sheet: {}", e)))?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(header_row) => header_row.iter().map(excel_display).collect(),
        None => Vec::new(),
    };

    let rows: Vec<Vec<Cell>> = rows_iter
        .map(|row| row.iter().map(excel_cell).collect())
        .collect();

    Ok(Dataset::new(name, headers, rows))
}

fn excel_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::parse(s),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}

fn excel_display(data: &Data) -> String {
    match data {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_delimiter_autodetect() {
        let data = b"ID;Sexe;Age\n1;2;34\n2;1;41\n";
        let ds = load(data, Some("people.csv"), "hr", 1000, 50).unwrap();
        assert_eq!(ds.columns(), &["ID", "Sexe", "Age"]);
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.cell(0, 2).as_number(), Some(34.0));
    }

    #[test]
    fn csv_without_extension_defaults_to_comma() {
        let data = b"a,b\n1,2\n";
        let ds = load(data, None, "hr", 1000, 50).unwrap();
        assert_eq!(ds.columns(), &["a", "b"]);
        assert_eq!(ds.row_count(), 1);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = load(b"bad", Some("data.txt"), "hr", 1000, 50).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(_)));
    }

    #[test]
    fn dimension_limits_are_enforced() {
        let data = b"a,b\n1,2\n3,4\n5,6\n";
        let err = load(data, Some("big.csv"), "hr", 2, 50).unwrap_err();
        assert!(matches!(err, Error::DatasetTooLarge { rows: 3, .. }));

        let err = load(data, Some("wide.csv"), "hr", 100, 1).unwrap_err();
        assert!(matches!(err, Error::DatasetTooLarge { columns: 2, .. }));
    }

    #[test]
    fn cell_display_matches_client_strings() {
        assert_eq!(Cell::Number(1.0).display(), "1");
        assert_eq!(Cell::Number(1.5).display(), "1.5");
        assert_eq!(Cell::Text("Privé".into()).display(), "Privé");
        assert_eq!(Cell::Empty.display(), "");
    }

    #[test]
    fn filtered_copy_leaves_source_untouched() {
        let ds = Dataset::new(
            "hr",
            vec!["x".into()],
            vec![vec![Cell::Number(1.0)], vec![Cell::Number(2.0)]],
        );
        let filtered = ds.filter_rows(|i| i == 1);
        assert_eq!(filtered.row_count(), 1);
        assert_eq!(ds.row_count(), 2);
    }

    #[test]
    fn with_column_replaces_existing_values() {
        let ds = Dataset::new("hr", vec!["x".into()], vec![vec![Cell::Number(1.0)]]);
        let out = ds.with_column("x", vec![Cell::Number(9.0)]);
        assert_eq!(out.column_count(), 1);
        assert_eq!(out.cell(0, 0).as_number(), Some(9.0));
    }
}
