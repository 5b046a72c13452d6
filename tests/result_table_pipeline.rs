use result_table_engine::config::parse_config;
use result_table_engine::export::{export_csv, export_xlsx};
use result_table_engine::filter::DateRange;
use result_table_engine::store;
use result_table_engine::{ResultTable, Value};

const PAYLOAD: &str = r#"{
  "response": "success",
  "message": "Results fetched",
  "payload": [
    {"allotmentId": 1, "traineeName": "Asha Rao",   "batch": "JAVA-01", "percentage": 92,   "submittedOn": "2024-04-02T10:15:00Z"},
    {"allotmentId": 2, "traineeName": "Ben Ortiz",  "batch": "JAVA-02", "percentage": "50", "submittedOn": "2024-04-03"},
    {"allotmentId": 3, "traineeName": "Chen Wei",   "batch": "JAVA-01", "percentage": 10,   "submittedOn": "2024-04-09 09:00:00"},
    {"allotmentId": 4, "traineeName": "Dana Ivers", "batch": "JAVA-01", "percentage": null, "submittedOn": null},
    {"allotmentId": 5, "traineeName": "Eli Park",   "batch": "JAVA-02", "percentage": 67.5, "submittedOn": "2024-04-12"}
  ]
}"#;

const VIEW: &str = r#"
page_size: 2
score_field: percentage
header_map:
  traineeName: Trainee
  percentage: Score (%)
"#;

fn table() -> ResultTable {
    let config = parse_config(VIEW).unwrap();
    let records = store::from_json_reader(PAYLOAD.as_bytes()).unwrap();
    ResultTable::with_records(&config, records.records().to_vec()).unwrap()
}

fn names(table: &ResultTable) -> Vec<String> {
    table
        .visible()
        .iter()
        .map(|r| r.display_or("traineeName", ""))
        .collect()
}

#[test]
fn filter_sort_and_page_compose() {
    let mut table = table();
    table.set_discrete("batch", "JAVA-01");
    table.toggle_sort("percentage");
    table.toggle_sort("percentage");

    assert_eq!(names(&table), vec!["Asha Rao", "Chen Wei", "Dana Ivers"]);

    let first = table.page();
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.records.len(), 2);
    assert!(table.next_page());
    assert_eq!(table.page().records.len(), 1);
    assert!(!table.next_page());

    table.set_query("chen");
    assert_eq!(table.page_state().current_page(), 1);
    assert_eq!(names(&table), vec!["Chen Wei"]);
}

#[test]
fn date_range_excludes_undated_rows() {
    let mut table = table();
    table.set_date_range(
        "submittedOn",
        DateRange {
            from: chrono::NaiveDate::from_ymd_opt(2024, 4, 2),
            to: chrono::NaiveDate::from_ymd_opt(2024, 4, 9),
        },
    );
    assert_eq!(names(&table), vec!["Asha Rao", "Ben Ortiz", "Chen Wei"]);
}

#[test]
fn distribution_over_filtered_rows() {
    let mut table = table();
    table.set_discrete("batch", "all");
    let distribution = table.distribution();

    assert_eq!(distribution.summary.total_users, 5);
    assert_eq!(distribution.summary.passing_students, 3);
    assert_eq!(distribution.summary.pass_percentage_display(), "60.0");
    assert_eq!(distribution.range_named("50%").unwrap().count(), 1);
    assert_eq!(distribution.range_named("0-9%").unwrap().count(), 1);
    assert_eq!(distribution.member_total(), 5);
}

#[test]
fn exports_follow_visible_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = parse_config(VIEW).unwrap();
    let mut table = table();
    table.set_discrete("batch", "JAVA-02");

    let csv_path = export_csv(&table.visible(), &config.columns, "java-02", dir.path())
        .unwrap()
        .unwrap();
    let csv = std::fs::read_to_string(csv_path).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("allotmentId,Trainee,batch,Score (%),submittedOn")
    );
    assert_eq!(lines.count(), 2);

    let xlsx = export_xlsx(&table.visible(), &config.columns, "java-02", "Batch", dir.path())
        .unwrap();
    assert!(xlsx.is_some_and(|path| path.ends_with("java-02.xlsx")));

    table.set_query("nobody");
    let nothing = export_xlsx(&table.visible(), &config.columns, "none", "Batch", dir.path())
        .unwrap();
    assert!(nothing.is_none());
}

#[test]
fn acknowledged_toggle_patches_one_row() {
    let mut table = table();
    assert!(table.patch_field("3", "retakeAllowed", true));
    let chen = table
        .visible()
        .into_iter()
        .find(|r| r.display_or("traineeName", "") == "Chen Wei")
        .unwrap();
    assert_eq!(chen.get("retakeAllowed"), Some(&Value::Bool(true)));
}
