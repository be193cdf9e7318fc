use std::path::Path;

use anyhow::Context;
use calamine::{open_workbook_auto, Data, DataType, Reader};
use tracing::{debug, warn};

/// One data row of an import sheet, keyed by the header row's labels in
/// column order. Columns with a blank header are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetRow {
    cells: Vec<(String, String)>,
}

impl SheetRow {
    pub fn new<I, K, V>(cells: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: cells
                .into_iter()
                .map(|(header, value)| (header.into(), value.into()))
                .filter(|(header, _)| !header.trim().is_empty())
                .collect(),
        }
    }

    /// Looks a column up by header, ignoring case and surrounding whitespace.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name.trim().eq_ignore_ascii_case(header))
            .map(|(_, value)| value.as_str())
    }

    pub fn cells(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells
            .iter()
            .map(|(header, value)| (header.as_str(), value.as_str()))
    }
}

/// Reads the first worksheet of a workbook, or a CSV file, into rows.
pub fn read_rows(path: &Path) -> anyhow::Result<Vec<SheetRow>> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        read_csv_rows(path)
    } else {
        read_workbook_rows(path)
    }
}

fn read_csv_rows(path: &Path) -> anyhow::Result<Vec<SheetRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(SheetRow::new(headers.iter().zip(record.iter())));
    }

    debug!(rows = rows.len(), path = %path.display(), "read csv rows");
    Ok(rows)
}

fn read_workbook_rows(path: &Path) -> anyhow::Result<Vec<SheetRow>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;

    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        warn!(path = %path.display(), "workbook contains no sheets");
        return Ok(Vec::new());
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("failed to read sheet '{sheet_name}'"))?;

    let mut lines = range.rows();
    let Some(header_row) = lines.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row.iter().map(cell_text).collect();

    let rows: Vec<SheetRow> = lines
        .map(|line| SheetRow::new(headers.iter().cloned().zip(line.iter().map(cell_text))))
        .collect();

    debug!(rows = rows.len(), sheet = %sheet_name, "read workbook rows");
    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) => cell
            .as_date()
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) => s.chars().take(10).collect(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn lookup_ignores_case_and_padding() {
        let row = SheetRow::new([(" Team ", "Alpha"), ("employee", "Bob"), ("", "dropped")]);
        assert_eq!(row.get("Team"), Some("Alpha"));
        assert_eq!(row.get("Employee"), Some("Bob"));
        assert_eq!(row.cells().count(), 2);
    }

    #[test]
    fn csv_rows_follow_header_order() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Team,Employee,Question,5-May,6-May").unwrap();
        writeln!(file, "Alpha,Bob,Q1,On track,").unwrap();
        writeln!(file, ",Bob,Q2,Leave").unwrap();
        file.flush().unwrap();

        let rows = read_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        let headers: Vec<&str> = rows[0].cells().map(|(h, _)| h).collect();
        assert_eq!(headers, vec!["Team", "Employee", "Question", "5-May", "6-May"]);
        assert_eq!(rows[0].get("5-May"), Some("On track"));
        assert_eq!(rows[1].get("Team"), Some(""));
        assert_eq!(rows[1].get("6-May"), None);
    }

    #[test]
    fn integral_floats_drop_decimals() {
        assert_eq!(cell_text(&Data::Float(3.0)), "3");
        assert_eq!(cell_text(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_text(&Data::Empty), "");
    }
}
