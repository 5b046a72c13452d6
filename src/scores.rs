use serde::{Deserialize, Serialize};

use crate::error::{Result, TableError};
use crate::models::Record;

pub const DEFAULT_PASS_MARK: f64 = 50.0;

/// Inclusive score band, e.g. `50%` covering exactly [50, 50].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    pub label: String,
    pub min: f64,
    pub max: f64,
}

impl RangeBounds {
    pub fn new(label: impl Into<String>, min: f64, max: f64) -> Result<Self> {
        let label = label.into();
        if min > max || !min.is_finite() || !max.is_finite() {
            return Err(TableError::InvalidRange { label, min, max });
        }
        Ok(Self { label, min, max })
    }

    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && score <= self.max
    }
}

pub fn default_ranges() -> Vec<RangeBounds> {
    let band = |label: &str, min: f64, max: f64| RangeBounds {
        label: label.to_string(),
        min,
        max,
    };
    vec![
        band("0-9%", 0.0, 9.99),
        band("10-19%", 10.0, 19.99),
        band("20-29%", 20.0, 29.99),
        band("30-39%", 30.0, 39.99),
        band("40-49%", 40.0, 49.99),
        band("50%", 50.0, 50.0),
        band("51-59%", 50.01, 59.99),
        band("60-69%", 60.0, 69.99),
        band("70-79%", 70.0, 79.99),
        band("80-89%", 80.0, 89.99),
        band("90-100%", 90.0, 100.0),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRange {
    pub label: String,
    pub min: f64,
    pub max: f64,
    pub members: Vec<Record>,
}

impl ScoreRange {
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Share of `total` that landed in this range; 0 when `total` is 0.
    pub fn share_of(&self, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            self.members.len() as f64 / total as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    pub total_users: usize,
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub passing_students: usize,
    pub failing_students: usize,
    pub pass_percentage: f64,
}

impl ScoreSummary {
    pub fn average_display(&self) -> String {
        format!("{:.2}", self.average)
    }

    pub fn pass_percentage_display(&self) -> String {
        format!("{:.1}", self.pass_percentage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreDistribution {
    pub summary: ScoreSummary,
    ranges: Vec<ScoreRange>,
}

impl ScoreDistribution {
    /// Every configured range in configuration order, empty ones included.
    pub fn all_ranges(&self) -> &[ScoreRange] {
        &self.ranges
    }

    /// Ranges with at least one member, for the chart view.
    pub fn populated_ranges(&self) -> impl Iterator<Item = &ScoreRange> {
        self.ranges.iter().filter(|range| !range.members.is_empty())
    }

    /// Drill-down by chart bar index over `all_ranges`.
    pub fn range_at(&self, index: usize) -> Option<&ScoreRange> {
        self.ranges.get(index)
    }

    pub fn range_named(&self, label: &str) -> Option<&ScoreRange> {
        self.ranges.iter().find(|range| range.label == label)
    }

    /// Sum of per-range counts; exceeds the record count when ranges overlap.
    pub fn member_total(&self) -> usize {
        self.ranges.iter().map(ScoreRange::count).sum()
    }
}

/// A record joins every range that contains its score, so overlapping
/// bounds count the record more than once.
pub fn aggregate(
    records: &[Record],
    score_field: &str,
    ranges: &[RangeBounds],
    pass_mark: f64,
) -> ScoreDistribution {
    let mut buckets: Vec<ScoreRange> = ranges
        .iter()
        .map(|bounds| ScoreRange {
            label: bounds.label.clone(),
            min: bounds.min,
            max: bounds.max,
            members: Vec::new(),
        })
        .collect();

    for record in records {
        let score = record.score(score_field);
        for (bounds, bucket) in ranges.iter().zip(buckets.iter_mut()) {
            if bounds.contains(score) {
                bucket.members.push(record.clone());
            }
        }
    }

    let summary = summarize(records, score_field, pass_mark);
    tracing::debug!(
        records = records.len(),
        ranges = buckets.len(),
        passing = summary.passing_students,
        "score aggregation"
    );

    ScoreDistribution {
        summary,
        ranges: buckets,
    }
}

pub fn summarize(records: &[Record], score_field: &str, pass_mark: f64) -> ScoreSummary {
    if records.is_empty() {
        return ScoreSummary::default();
    }

    let scores: Vec<f64> = records.iter().map(|r| r.score(score_field)).collect();
    let total = scores.len();
    let sum: f64 = scores.iter().sum();
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let passing = scores.iter().filter(|score| **score >= pass_mark).count();

    ScoreSummary {
        total_users: total,
        average: sum / total as f64,
        max,
        min,
        passing_students: passing,
        failing_students: total - passing,
        pass_percentage: passing as f64 / total as f64 * 100.0,
    }
}
