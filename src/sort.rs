use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{Record, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Direction::Ascending => "▲",
            Direction::Descending => "▼",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub key: Option<String>,
    #[serde(default)]
    pub direction: Direction,
}

impl SortState {
    pub fn by(key: impl Into<String>, direction: Direction) -> Self {
        Self {
            key: Some(key.into()),
            direction,
        }
    }

    /// Same key flips direction; a new key starts ascending.
    pub fn toggle(&mut self, key: &str) {
        if self.key.as_deref() == Some(key) {
            self.direction = self.direction.flipped();
        } else {
            self.key = Some(key.to_string());
            self.direction = Direction::Ascending;
        }
    }

    pub fn clear(&mut self) {
        self.key = None;
        self.direction = Direction::Ascending;
    }

    /// Header glyph for `key`, empty when the column is not the active one.
    pub fn indicator(&self, key: &str) -> &'static str {
        if self.key.as_deref() == Some(key) {
            self.direction.glyph()
        } else {
            ""
        }
    }
}

enum SortKey {
    Missing,
    Number(f64),
    Text(String),
}

impl SortKey {
    fn of(value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return SortKey::Missing;
        };
        if let Some(number) = value.as_number() {
            return SortKey::Number(number);
        }
        let text = value.as_text();
        if text.is_empty() {
            SortKey::Missing
        } else {
            SortKey::Text(text.to_lowercase())
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Missing => 0,
            SortKey::Number(_) => 1,
            SortKey::Text(_) => 2,
        }
    }
}

// Missing < numbers < text keeps the comparator a total order.
fn compare_keys(a: &SortKey, b: &SortKey) -> Ordering {
    match (a, b) {
        (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(y),
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
        _ => a.rank().cmp(&b.rank()),
    }
}

pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    compare_keys(&SortKey::of(a), &SortKey::of(b))
}

/// A sorted copy; equal keys keep their relative order.
///
/// Values of different kinds are ranked missing < numbers < text, so a
/// placeholder such as `"-"` sits after every real score when ascending and
/// before them when descending.
pub fn sort(records: &[Record], state: &SortState) -> Vec<Record> {
    let Some(key) = state.key.as_deref() else {
        return records.to_vec();
    };

    let mut keyed: Vec<(SortKey, &Record)> = records
        .iter()
        .map(|record| (SortKey::of(record.get(key)), record))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = compare_keys(a, b);
        match state.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    });

    keyed.into_iter().map(|(_, record)| record.clone()).collect()
}
