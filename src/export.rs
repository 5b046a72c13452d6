use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TableError};
use crate::models::{Record, Value};

const MIN_COLUMN_WIDTH: usize = 10;
const COLUMN_PADDING: usize = 2;
const HEADER_FILL: u32 = 0xD9E1F2;
const MAX_SHEET_NAME: usize = 31;

/// Source field name to display column title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMap(BTreeMap<String, String>);

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, title: impl Into<String>) {
        self.0.insert(field.into(), title.into());
    }

    pub fn title_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.0.get(field).map(String::as_str).unwrap_or(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ColumnMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, title)| (field.into(), title.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub field: String,
    pub title: String,
    pub width: usize,
}

/// Every field seen across `records`, in first-seen order, titled through `columns`.
pub fn resolve_columns(records: &[Record], columns: &ColumnMap) -> Vec<Column> {
    let mut fields: Vec<&str> = Vec::new();
    for record in records {
        for name in record.field_names() {
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
    }

    fields
        .into_iter()
        .map(|field| {
            let title = columns.title_for(field).to_string();
            let longest_cell = records
                .iter()
                .filter_map(|record| record.get(field))
                .map(|value| value.as_text().chars().count())
                .max()
                .unwrap_or(0);
            let width = MIN_COLUMN_WIDTH
                .max(longest_cell)
                .max(title.chars().count())
                + COLUMN_PADDING;
            Column {
                field: field.to_string(),
                title,
                width,
            }
        })
        .collect()
}

fn sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .take(MAX_SHEET_NAME)
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim().to_string();
    if cleaned.is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

/// Single-sheet workbook with a styled header row.
pub fn to_xlsx_bytes(records: &[Record], columns: &ColumnMap, sheet: &str) -> Result<Vec<u8>> {
    let resolved = resolve_columns(records, columns);

    let header_format = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_border(FormatBorder::Thin);
    let cell_format = Format::new()
        .set_align(FormatAlign::Left)
        .set_border(FormatBorder::Thin);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name(sheet))?;

    for (col, column) in resolved.iter().enumerate() {
        let col = col as u16;
        worksheet.set_column_width(col, column.width as f64)?;
        worksheet.write_string_with_format(0, col, column.title.as_str(), &header_format)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = (index + 1) as u32;
        for (col, column) in resolved.iter().enumerate() {
            let col = col as u16;
            match record.get(&column.field) {
                Some(Value::Number(n)) if n.is_finite() => {
                    worksheet.write_number_with_format(row, col, *n, &cell_format)?;
                }
                Some(Value::Bool(b)) => {
                    worksheet.write_boolean_with_format(row, col, *b, &cell_format)?;
                }
                Some(Value::Text(text)) => {
                    worksheet.write_string_with_format(row, col, text.as_str(), &cell_format)?;
                }
                _ => {
                    worksheet.write_blank(row, col, &cell_format)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn output_path(dir: &Path, file_name: &str, extension: &str) -> PathBuf {
    let suffix = format!(".{extension}");
    if file_name.to_lowercase().ends_with(&suffix) {
        dir.join(file_name)
    } else {
        dir.join(format!("{file_name}{suffix}"))
    }
}

/// Writes `<file_name>.xlsx` under `dir`. Zero rows write nothing.
pub fn export_xlsx(
    records: &[Record],
    columns: &ColumnMap,
    file_name: &str,
    sheet: &str,
    dir: &Path,
) -> Result<Option<PathBuf>> {
    if records.is_empty() {
        tracing::warn!(file_name, "no rows to export; skipping spreadsheet");
        return Ok(None);
    }

    let bytes = to_xlsx_bytes(records, columns, sheet)?;
    let path = output_path(dir, file_name, "xlsx");
    std::fs::write(&path, bytes).map_err(|e| TableError::io(&path, e))?;
    tracing::info!(path = %path.display(), rows = records.len(), "spreadsheet exported");
    Ok(Some(path))
}

/// Same column resolution as the spreadsheet, written as `<file_name>.csv`.
pub fn export_csv(
    records: &[Record],
    columns: &ColumnMap,
    file_name: &str,
    dir: &Path,
) -> Result<Option<PathBuf>> {
    if records.is_empty() {
        tracing::warn!(file_name, "no rows to export; skipping csv");
        return Ok(None);
    }

    let resolved = resolve_columns(records, columns);
    let path = output_path(dir, file_name, "csv");
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(resolved.iter().map(|c| c.title.as_str()))?;
    for record in records {
        writer.write_record(
            resolved
                .iter()
                .map(|c| record.get(&c.field).map(Value::as_text).unwrap_or_default()),
        )?;
    }
    writer.flush().map_err(|e| TableError::io(&path, e))?;
    tracing::info!(path = %path.display(), rows = records.len(), "csv exported");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: serde_json::Value) -> Vec<Record> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| Record::from_json(v.clone()).unwrap())
            .collect()
    }

    #[test]
    fn unmapped_fields_keep_raw_names() {
        let records = rows(json!([{"a": 1, "b": 2}]));
        let columns: ColumnMap = [("a", "Col A")].into_iter().collect();
        let titles: Vec<String> = resolve_columns(&records, &columns)
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["Col A", "b"]);
    }

    #[test]
    fn empty_map_uses_field_names() {
        let records = rows(json!([{"traineeName": "A"}, {"traineeName": "B", "batch": "X"}]));
        let titles: Vec<String> = resolve_columns(&records, &ColumnMap::new())
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["traineeName", "batch"]);
    }

    #[test]
    fn widths_take_longest_text_plus_padding() {
        let records = rows(json!([
            {"id": 1, "email": "someone.long@example.com"}
        ]));
        let columns: ColumnMap = [("id", "Identifier Number")].into_iter().collect();
        let resolved = resolve_columns(&records, &columns);
        assert_eq!(resolved[0].width, "Identifier Number".len() + 2);
        assert_eq!(resolved[1].width, "someone.long@example.com".len() + 2);

        let short = resolve_columns(&rows(json!([{"x": 1}])), &ColumnMap::new());
        assert_eq!(short[0].width, 12);
    }

    #[test]
    fn workbook_bytes_are_a_zip_container() {
        let records = rows(json!([{"name": "Asha", "score": 88.5, "passed": true, "note": null}]));
        let bytes = to_xlsx_bytes(&records, &ColumnMap::new(), "Results").unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn workbook_reads_back_with_titles_and_typed_cells() {
        use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};

        let records = rows(json!([
            {"name": "Asha", "note": null, "score": 88.5, "passed": true},
            {"name": "Ben", "note": "late", "score": 41, "passed": false}
        ]));
        let columns: ColumnMap = [("name", "Trainee"), ("score", "Score (%)")]
            .into_iter()
            .collect();
        let bytes = to_xlsx_bytes(&records, &columns, "Results").unwrap();

        let mut workbook: Xlsx<_> =
            open_workbook_from_rs(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Results".to_string()]);
        let range = workbook.worksheet_range("Results").unwrap();
        let cells: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();

        assert_eq!(
            cells[0],
            vec![
                Data::String("Trainee".to_string()),
                Data::String("note".to_string()),
                Data::String("Score (%)".to_string()),
                Data::String("passed".to_string()),
            ]
        );
        assert_eq!(
            cells[1],
            vec![
                Data::String("Asha".to_string()),
                Data::Empty,
                Data::Float(88.5),
                Data::Bool(true),
            ]
        );
        assert_eq!(cells[2][1], Data::String("late".to_string()));
        assert_eq!(cells[2][2], Data::Float(41.0));
        assert_eq!(cells.len(), 3);
    }

    #[test]
    fn sheet_names_are_sanitized() {
        assert_eq!(sheet_name("Q1/Q2 [final]"), "Q1_Q2 _final_");
        assert_eq!(sheet_name(""), "Sheet1");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
    }

    #[test]
    fn export_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let records = rows(json!([{"a": 1}]));
        let path = export_xlsx(&records, &ColumnMap::new(), "test_results", "Results", dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(path, dir.path().join("test_results.xlsx"));
        assert!(path.exists());
    }

    #[test]
    fn empty_export_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let written = export_xlsx(&[], &ColumnMap::new(), "empty", "Results", dir.path()).unwrap();
        assert!(written.is_none());
        assert!(!dir.path().join("empty.xlsx").exists());
    }

    #[test]
    fn csv_export_uses_titles() {
        let dir = tempfile::tempdir().unwrap();
        let records = rows(json!([{"a": 1, "b": "x,y"}]));
        let columns: ColumnMap = [("a", "Col A")].into_iter().collect();
        let path = export_csv(&records, &columns, "scores.csv", dir.path())
            .unwrap()
            .unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, "Col A,b\n1,\"x,y\"\n");
    }
}
