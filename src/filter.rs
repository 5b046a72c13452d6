use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::Record;

/// Selected value that disables a discrete filter.
pub const ALL: &str = "all";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    fn contains(&self, day: NaiveDate) -> bool {
        self.from.map_or(true, |from| day >= from) && self.to.map_or(true, |to| day <= to)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    #[serde(default)]
    pub free_text_query: String,
    #[serde(default)]
    pub discrete_filters: BTreeMap<String, String>,
    #[serde(default)]
    pub date_ranges: BTreeMap<String, DateRange>,
}

impl FilterState {
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            free_text_query: query.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.free_text_query.is_empty()
            && self.discrete_filters.values().all(|v| v.is_empty() || v == ALL)
            && self.date_ranges.values().all(DateRange::is_unbounded)
    }

    pub fn matches(&self, record: &Record) -> bool {
        matches_query(record, &self.free_text_query)
            && self
                .discrete_filters
                .iter()
                .all(|(field, selected)| matches_discrete(record, field, selected))
            && self
                .date_ranges
                .iter()
                .all(|(field, range)| matches_date(record, field, range))
    }
}

fn matches_query(record: &Record, query: &str) -> bool {
    let query = query.to_lowercase();
    if query.is_empty() {
        return true;
    }
    record
        .fields()
        .any(|(_, value)| value.as_text().to_lowercase().contains(&query))
}

fn matches_discrete(record: &Record, field: &str, selected: &str) -> bool {
    if selected.is_empty() || selected == ALL {
        return true;
    }
    record
        .get(field)
        .is_some_and(|value| !value.is_null() && value.as_text() == selected)
}

fn matches_date(record: &Record, field: &str, range: &DateRange) -> bool {
    if range.is_unbounded() {
        return true;
    }
    match record.get(field).and_then(|value| value.as_date()) {
        Some(day) => range.contains(day),
        None => false,
    }
}

/// Records passing every active predicate, in their original order.
pub fn filter(records: &[Record], state: &FilterState) -> Vec<Record> {
    if state.is_empty() {
        return records.to_vec();
    }
    let kept: Vec<Record> = records
        .iter()
        .filter(|record| state.matches(record))
        .cloned()
        .collect();
    tracing::debug!(input = records.len(), kept = kept.len(), "filter stage");
    kept
}

/// Distinct non-empty values of `field`, for populating a select.
pub fn distinct_values(records: &[Record], field: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for record in records {
        if let Some(text) = record.get(field).map(|value| value.as_text()) {
            if !text.is_empty() && !values.contains(&text) {
                values.push(text);
            }
        }
    }
    values
}
