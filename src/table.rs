use crate::config::ViewConfig;
use crate::error::{Result, TableError};
use crate::filter::{self, DateRange, FilterState};
use crate::models::{Record, Value};
use crate::paginate::{self, Page, PageState};
use crate::scores::{self, RangeBounds, ScoreDistribution};
use crate::sort::{self, SortState};
use crate::store::RecordStore;

/// Store -> filter -> sort -> paginate, recomputed from current state on every read.
#[derive(Debug, Clone)]
pub struct ResultTable {
    store: RecordStore,
    filters: FilterState,
    sort: SortState,
    page: PageState,
    score_field: String,
    ranges: Vec<RangeBounds>,
    pass_mark: f64,
    error: Option<String>,
}

impl ResultTable {
    pub fn new(config: &ViewConfig) -> Result<Self> {
        Ok(Self {
            store: RecordStore::default().with_id_fields(config.id_fields.clone()),
            filters: FilterState::default(),
            sort: SortState::default(),
            page: PageState::new(config.page_size)?,
            score_field: config.score_field.clone(),
            ranges: config.ranges.clone(),
            pass_mark: config.pass_mark,
            error: None,
        })
    }

    pub fn with_records(config: &ViewConfig, records: Vec<Record>) -> Result<Self> {
        let mut table = Self::new(config)?;
        table.replace_records(records);
        Ok(table)
    }

    /// Takes a fetch result; a failure empties the table and keeps the message for display.
    pub fn load(&mut self, outcome: Result<Vec<Record>>) {
        match outcome {
            Ok(records) => self.replace_records(records),
            Err(TableError::Rejected { message }) => self.fail(message),
            Err(other) => self.fail(other.to_string()),
        }
    }

    fn fail(&mut self, message: String) {
        tracing::warn!(%message, "result table load failed");
        self.store.replace(Vec::new());
        self.page.reset();
        self.error = Some(message);
    }

    pub fn replace_records(&mut self, records: Vec<Record>) {
        self.store.replace(records);
        self.error = None;
        self.page.reset();
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    pub fn page_state(&self) -> &PageState {
        &self.page
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.filters.free_text_query = query.into();
        self.page.reset();
    }

    pub fn set_discrete(&mut self, field: impl Into<String>, selected: impl Into<String>) {
        self.filters
            .discrete_filters
            .insert(field.into(), selected.into());
        self.page.reset();
    }

    pub fn set_date_range(&mut self, field: impl Into<String>, range: DateRange) {
        self.filters.date_ranges.insert(field.into(), range);
        self.page.reset();
    }

    pub fn set_filters(&mut self, filters: FilterState) {
        self.filters = filters;
        self.page.reset();
    }

    pub fn toggle_sort(&mut self, key: &str) {
        self.sort.toggle(key);
        self.page.reset();
    }

    pub fn set_sort(&mut self, sort: SortState) {
        self.sort = sort;
        self.page.reset();
    }

    pub fn next_page(&mut self) -> bool {
        let count = self.filtered().len();
        self.page.next(count)
    }

    pub fn previous_page(&mut self) -> bool {
        self.page.previous()
    }

    pub fn go_to_page(&mut self, page: usize) {
        let count = self.filtered().len();
        self.page.go_to(page, count);
    }

    /// Applies an acknowledged toggle to one record without refetching.
    pub fn patch_field(&mut self, id: &str, field: &str, value: impl Into<Value>) -> bool {
        self.store.patch_field(id, field, value)
    }

    fn filtered(&self) -> Vec<Record> {
        filter::filter(self.store.records(), &self.filters)
    }

    /// Filtered and sorted rows, independent of paging.
    pub fn visible(&self) -> Vec<Record> {
        sort::sort(&self.filtered(), &self.sort)
    }

    pub fn page(&self) -> Page<Record> {
        paginate::paginate(&self.visible(), &self.page)
    }

    /// Score distribution over the filtered rows.
    pub fn distribution(&self) -> ScoreDistribution {
        scores::aggregate(
            &self.filtered(),
            &self.score_field,
            &self.ranges,
            self.pass_mark,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::Direction;
    use serde_json::json;

    fn trainees(count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| {
                let batch = if i % 2 == 0 { "B1" } else { "B2" };
                Record::from_json(json!({
                    "allotmentId": i + 1,
                    "traineeName": format!("Trainee {:02}", i + 1),
                    "batch": batch,
                    "percentage": (i * 7) % 101,
                }))
                .unwrap()
            })
            .collect()
    }

    fn names(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.display_or("traineeName", "?"))
            .collect()
    }

    #[test]
    fn filter_change_resets_page() {
        let mut table = ResultTable::with_records(&ViewConfig::default(), trainees(13)).unwrap();
        assert!(table.next_page());
        assert!(table.next_page());
        assert!(!table.next_page());
        assert_eq!(table.page().records.len(), 1);

        table.set_discrete("batch", "B1");
        assert_eq!(table.page_state().current_page(), 1);
        assert_eq!(table.page().total_pages, 2);
    }

    #[test]
    fn sort_then_page() {
        let mut table = ResultTable::with_records(&ViewConfig::default(), trainees(8)).unwrap();
        table.set_sort(SortState::by("traineeName", Direction::Descending));
        let first = table.page();
        assert_eq!(first.records[0].display_or("traineeName", ""), "Trainee 08");
        assert_eq!(first.total_pages, 2);

        let visible = table.visible();
        let mut rebuilt = Vec::new();
        for page in 1..=first.total_pages {
            table.go_to_page(page);
            rebuilt.extend(table.page().records);
        }
        assert_eq!(names(&rebuilt), names(&visible));
    }

    #[test]
    fn failed_load_empties_table_with_message() {
        let mut table = ResultTable::with_records(&ViewConfig::default(), trainees(3)).unwrap();
        table.load(Err(TableError::Rejected {
            message: "Invalid token".to_string(),
        }));
        assert_eq!(table.error(), Some("Invalid token"));
        assert!(table.visible().is_empty());
        assert_eq!(table.page().label(), "Page 1 of 1");

        table.load(Ok(trainees(2)));
        assert_eq!(table.error(), None);
        assert_eq!(table.visible().len(), 2);
    }

    #[test]
    fn malformed_payload_surfaces_as_table_error() {
        let mut table = ResultTable::with_records(&ViewConfig::default(), trainees(3)).unwrap();
        table.load(Err(TableError::InvalidRecord { index: 2 }));
        assert_eq!(table.error(), Some("payload entry 2 is not an object"));
        assert!(table.visible().is_empty());
        assert_eq!(table.page().total_records, 0);
    }

    #[test]
    fn distribution_follows_filters() {
        let mut table = ResultTable::with_records(&ViewConfig::default(), trainees(10)).unwrap();
        table.set_query("Trainee 01");
        let distribution = table.distribution();
        assert_eq!(distribution.summary.total_users, 1);
        assert_eq!(distribution.range_named("0-9%").unwrap().count(), 1);
    }

    #[test]
    fn acknowledged_patch_shows_in_view() {
        let mut table = ResultTable::with_records(&ViewConfig::default(), trainees(2)).unwrap();
        assert!(table.patch_field("2", "canRetake", true));
        let visible = table.visible();
        assert_eq!(visible[1].get("canRetake"), Some(&Value::Bool(true)));
        assert_eq!(visible[0].get("canRetake"), None);
    }
}
