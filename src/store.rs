use std::io::Read;
use std::path::Path;

use crate::error::{Result, TableError};
use crate::models::{Envelope, Record, Value};

pub const DEFAULT_ID_FIELDS: &[&str] = &[
    "allotmentId",
    "testId",
    "courseId",
    "assignmentId",
    "submissionId",
    "id",
];

/// Records of the most recent fetch.
#[derive(Debug, Clone)]
pub struct RecordStore {
    records: Vec<Record>,
    id_fields: Vec<String>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RecordStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            id_fields: DEFAULT_ID_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn with_id_fields(mut self, id_fields: Vec<String>) -> Self {
        if !id_fields.is_empty() {
            self.id_fields = id_fields;
        }
        self
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn id_fields(&self) -> &[String] {
        &self.id_fields
    }

    /// Swap in the result of a new fetch.
    pub fn replace(&mut self, records: Vec<Record>) {
        tracing::debug!(previous = self.records.len(), next = records.len(), "replacing records");
        self.records = records;
    }

    /// Identity of the record at `position`: its id field, or the position itself.
    pub fn identity(&self, position: usize) -> Option<String> {
        self.records
            .get(position)
            .map(|record| record.id(&self.id_fields).unwrap_or_else(|| position.to_string()))
    }

    pub fn find(&self, id: &str) -> Option<&Record> {
        self.position_of(id).map(|position| &self.records[position])
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        let by_field = self
            .records
            .iter()
            .position(|record| record.id(&self.id_fields).as_deref() == Some(id));
        by_field.or_else(|| {
            id.parse::<usize>()
                .ok()
                .filter(|position| {
                    self.records
                        .get(*position)
                        .is_some_and(|record| record.id(&self.id_fields).is_none())
                })
        })
    }

    /// Apply a field change the server has already acknowledged.
    pub fn patch_field(&mut self, id: &str, field: &str, value: impl Into<Value>) -> bool {
        match self.position_of(id) {
            Some(position) => {
                self.records[position].set(field, value);
                true
            }
            None => {
                tracing::warn!(id, field, "no record to patch");
                false
            }
        }
    }
}

pub fn from_envelope(envelope: Envelope) -> Result<RecordStore> {
    envelope.into_records().map(RecordStore::new)
}

/// Either a full response envelope or a bare array of records.
pub fn from_json_reader<R: Read>(reader: R) -> Result<RecordStore> {
    let value: serde_json::Value = serde_json::from_reader(reader)?;
    match value {
        serde_json::Value::Array(_) => {
            let envelope = Envelope {
                response: "success".to_string(),
                payload: Some(value),
                message: None,
            };
            from_envelope(envelope)
        }
        other => from_envelope(serde_json::from_value(other)?),
    }
}

pub fn from_json_path(path: &Path) -> Result<RecordStore> {
    let file = std::fs::File::open(path).map_err(|e| TableError::io(path, e))?;
    from_json_reader(std::io::BufReader::new(file))
}

/// Header row names the fields; canonical numeric cells become numbers, empty cells null.
pub fn from_csv_reader<R: Read>(reader: R) -> Result<RecordStore> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(field, cell)| (field.to_string(), csv_cell(cell)))
            .collect();
        records.push(record);
    }

    Ok(RecordStore::new(records))
}

pub fn from_csv_path(path: &Path) -> Result<RecordStore> {
    let file = std::fs::File::open(path).map_err(|e| TableError::io(path, e))?;
    from_csv_reader(file)
}

fn csv_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    // Only cells that print back unchanged; `007` or `92.50` stay text.
    match trimmed.parse::<f64>() {
        Ok(number) if number.is_finite() && number.to_string() == trimmed => {
            Value::Number(number)
        }
        _ => Value::Text(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn allotments() -> RecordStore {
        let records = vec![
            Record::from_json(json!({"allotmentId": 11, "trainee": "Asha", "canRetake": false}))
                .unwrap(),
            Record::from_json(json!({"allotmentId": 12, "trainee": "Ben", "canRetake": false}))
                .unwrap(),
        ];
        RecordStore::new(records)
    }

    #[test]
    fn patch_targets_single_record_by_id() {
        let mut store = allotments();
        assert!(store.patch_field("12", "canRetake", true));
        assert_eq!(store.records()[0].get("canRetake"), Some(&Value::Bool(false)));
        assert_eq!(store.records()[1].get("canRetake"), Some(&Value::Bool(true)));
    }

    #[test]
    fn patch_unknown_id_is_reported() {
        let mut store = allotments();
        assert!(!store.patch_field("99", "canRetake", true));
    }

    #[test]
    fn identity_falls_back_to_position() {
        let store = RecordStore::new(vec![Record::from_json(json!({"name": "x"})).unwrap()]);
        assert_eq!(store.identity(0), Some("0".to_string()));
        assert!(store.find("0").is_some());
        assert_eq!(allotments().identity(1), Some("12".to_string()));
    }

    #[test]
    fn replace_swaps_whole_set() {
        let mut store = allotments();
        store.replace(Vec::new());
        assert!(store.is_empty());
    }

    #[test]
    fn reads_bare_arrays_and_envelopes() {
        let bare = from_json_reader(r#"[{"a": 1}, {"a": 2}]"#.as_bytes()).unwrap();
        assert_eq!(bare.len(), 2);

        let wrapped =
            from_json_reader(r#"{"response": "success", "payload": [{"a": 1}]}"#.as_bytes())
                .unwrap();
        assert_eq!(wrapped.len(), 1);

        let rejected =
            from_json_reader(r#"{"response": "error", "message": "No tests found"}"#.as_bytes());
        assert!(matches!(rejected, Err(TableError::Rejected { .. })));
    }

    #[test]
    fn csv_cells_are_typed() {
        let data = "name,percentage,completedOn\nAsha,92,2024-02-01\nBen,,2024-02-03\n";
        let store = from_csv_reader(data.as_bytes()).unwrap();
        let rows = store.records();
        assert_eq!(rows[0].get("percentage"), Some(&Value::Number(92.0)));
        assert_eq!(rows[1].get("percentage"), Some(&Value::Null));
        assert_eq!(rows[1].get("completedOn"), Some(&Value::from("2024-02-03")));
    }

    #[test]
    fn csv_keeps_leading_zero_codes_as_text() {
        let data = "employeeId,name,percentage\n007,Asha,92.50\n";
        let store = from_csv_reader(data.as_bytes()).unwrap();
        let row = &store.records()[0];
        assert_eq!(row.get("employeeId"), Some(&Value::from("007")));
        assert_eq!(row.get("percentage"), Some(&Value::from("92.50")));
        assert_eq!(row.score("percentage"), 92.5);

        let hits = crate::filter::filter(
            store.records(),
            &crate::filter::FilterState::with_query("007"),
        );
        assert_eq!(hits.len(), 1);

        let mut store = store.with_id_fields(vec!["employeeId".to_string()]);
        assert!(store.patch_field("007", "active", true));
    }
}
