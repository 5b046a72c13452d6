use std::fmt::Write;

use crate::models::Record;
use crate::scores::ScoreDistribution;
use crate::sort::{self, Direction, SortState};

const MEMBER_PREVIEW: usize = 5;
const LOWEST_SCORERS: usize = 5;

fn member_names(members: &[Record], name_field: &str) -> String {
    let mut names: Vec<String> = members
        .iter()
        .take(MEMBER_PREVIEW)
        .map(|record| record.display_or(name_field, "N/A"))
        .collect();
    if members.len() > MEMBER_PREVIEW {
        names.push(format!("+{} more", members.len() - MEMBER_PREVIEW));
    }
    names.join(", ")
}

pub fn build_report(
    title: &str,
    distribution: &ScoreDistribution,
    records: &[Record],
    score_field: &str,
    name_field: &str,
) -> String {
    let summary = &distribution.summary;
    let mut output = String::new();

    let _ = writeln!(output, "# {title}");
    let _ = writeln!(output, "Score field `{score_field}` across {} results", summary.total_users);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    if summary.total_users == 0 {
        let _ = writeln!(output, "No results recorded for this view.");
    } else {
        let _ = writeln!(output, "- Average: {}", summary.average_display());
        let _ = writeln!(output, "- Highest: {}", summary.max);
        let _ = writeln!(output, "- Lowest: {}", summary.min);
        let _ = writeln!(
            output,
            "- Passing: {} / Failing: {} ({}% pass rate)",
            summary.passing_students,
            summary.failing_students,
            summary.pass_percentage_display()
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Score Distribution");

    let mut populated = distribution.populated_ranges().peekable();
    if populated.peek().is_none() {
        let _ = writeln!(output, "No scores fall within the configured ranges.");
    } else {
        for range in populated {
            let _ = writeln!(
                output,
                "- {}: {} ({:.1}%) {}",
                range.label,
                range.count(),
                range.share_of(summary.total_users),
                member_names(&range.members, name_field)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Lowest Scores");

    let ascending = sort::sort(records, &SortState::by(score_field, Direction::Ascending));
    if ascending.is_empty() {
        let _ = writeln!(output, "No results recorded for this view.");
    } else {
        for record in ascending.iter().take(LOWEST_SCORERS) {
            let _ = writeln!(
                output,
                "- {}: {}",
                record.display_or(name_field, "N/A"),
                record.display_or(score_field, "Not Graded")
            );
        }
    }

    output
}
