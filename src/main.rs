use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use result_table_engine::config::{self, ViewConfig};
use result_table_engine::export::{self, resolve_columns};
use result_table_engine::filter::{DateRange, FilterState};
use result_table_engine::sort::{Direction, SortState};
use result_table_engine::{client, db, report, store};
use result_table_engine::{AuthContext, Record, ResultTable, TableError};

#[derive(Parser)]
#[command(name = "result-table")]
#[command(about = "Search, sort, analyze and export training result tables", long_about = None)]
struct Cli {
    /// View config (YAML); defaults to ~/.result-table/view.yml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("source")
        .args(["json", "csv", "url", "query"])
        .required(true)
        .multiple(false)
))]
struct SourceArgs {
    /// Response envelope or bare JSON array of records
    #[arg(long)]
    json: Option<PathBuf>,
    /// CSV file whose header row names the fields
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Endpoint to POST {user, token, ...params} to
    #[arg(long)]
    url: Option<String>,
    /// SELECT statement run against DATABASE_URL
    #[arg(long)]
    query: Option<String>,
    #[arg(long, requires = "url")]
    user: Option<String>,
    #[arg(long, requires = "url")]
    role: Option<String>,
    /// Extra request parameter, key=value (repeatable)
    #[arg(long = "param", requires = "url")]
    params: Vec<String>,
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[derive(Args)]
struct ViewArgs {
    /// Case-insensitive text matched against every field
    #[arg(long)]
    search: Option<String>,
    /// Discrete filter, field=value ("all" disables it)
    #[arg(long = "filter")]
    filters: Vec<String>,
    /// Inclusive day range, field=FROM..TO (either side may be empty)
    #[arg(long = "date-range")]
    date_ranges: Vec<String>,
    #[arg(long)]
    sort: Option<String>,
    #[arg(long, requires = "sort")]
    desc: bool,
    #[arg(long)]
    page_size: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Xlsx,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one page of the filtered, sorted table
    Show {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Summarize scores and bucket them into ranges
    Analyze {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        view: ViewArgs,
        /// Drill into the range at this index (0-based, over all ranges)
        #[arg(long)]
        range: Option<usize>,
    },
    /// Export the filtered, sorted rows
    Export {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, value_enum, default_value_t = ExportFormat::Xlsx)]
        format: ExportFormat,
        #[arg(long)]
        file_name: Option<String>,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Generate a markdown score report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, default_value = "Score Report")]
        title: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn load_view_config(path: Option<&PathBuf>) -> anyhow::Result<ViewConfig> {
    match path {
        Some(path) => config::load_config(path, false)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => match config::default_config_path() {
            Some(path) => Ok(config::load_config(&path, true)?),
            None => Ok(ViewConfig::default()),
        },
    }
}

async fn load_records(
    source: &SourceArgs,
    config: &ViewConfig,
) -> result_table_engine::Result<Vec<Record>> {
    if let Some(path) = &source.json {
        return Ok(store::from_json_path(path)?.records().to_vec());
    }
    if let Some(path) = &source.csv {
        return Ok(store::from_csv_path(path)?.records().to_vec());
    }
    if let Some(url) = &source.url {
        let auth = AuthContext {
            user: source.user.clone().unwrap_or_default(),
            token: std::env::var("RESULT_TABLE_TOKEN").unwrap_or_default(),
            role: source.role.clone(),
        };
        let base = config.endpoint.clone().unwrap_or_default();
        let api = client::ApiClient::new(base, auth, source.timeout)?;
        let params = client::parse_params(&source.params)?;
        return api.fetch_records(url, &params).await;
    }
    if let Some(sql) = &source.query {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            TableError::InvalidConfig("DATABASE_URL must be set for --query".to_string())
        })?;
        let pool = db::connect(&database_url).await?;
        return db::fetch_records(&pool, sql).await;
    }
    Ok(Vec::new())
}

fn parse_pair(raw: &str) -> anyhow::Result<(&str, &str)> {
    raw.split_once('=')
        .map(|(field, value)| (field.trim(), value.trim()))
        .with_context(|| format!("expected field=value, got '{raw}'"))
}

fn parse_day(raw: &str) -> anyhow::Result<Option<NaiveDate>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let day = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{raw}', expected YYYY-MM-DD"))?;
    Ok(Some(day))
}

fn filter_state(view: &ViewArgs) -> anyhow::Result<FilterState> {
    let mut state = FilterState::with_query(view.search.clone().unwrap_or_default());
    for raw in &view.filters {
        let (field, value) = parse_pair(raw)?;
        state
            .discrete_filters
            .insert(field.to_string(), value.to_string());
    }
    for raw in &view.date_ranges {
        let (field, bounds) = parse_pair(raw)?;
        let (from, to) = bounds
            .split_once("..")
            .with_context(|| format!("expected FROM..TO in '{raw}'"))?;
        state.date_ranges.insert(
            field.to_string(),
            DateRange {
                from: parse_day(from)?,
                to: parse_day(to)?,
            },
        );
    }
    Ok(state)
}

async fn build_table(
    source: &SourceArgs,
    view: &ViewArgs,
    mut config: ViewConfig,
) -> anyhow::Result<(ResultTable, ViewConfig)> {
    if let Some(page_size) = view.page_size {
        config.page_size = page_size;
    }
    config.validate()?;

    let mut table = ResultTable::new(&config)?;
    table.load(load_records(source, &config).await);

    table.set_filters(filter_state(view)?);
    if let Some(key) = &view.sort {
        let direction = if view.desc {
            Direction::Descending
        } else {
            Direction::Ascending
        };
        table.set_sort(SortState::by(key.clone(), direction));
    }
    Ok((table, config))
}

fn print_rows(records: &[Record], config: &ViewConfig, sort: &SortState) {
    let columns = resolve_columns(records, &config.columns);
    let header: Vec<String> = columns
        .iter()
        .map(|c| {
            let title = format!("{}{}", c.title, sort.indicator(&c.field));
            format!("{:<width$}", title, width = c.width)
        })
        .collect();
    println!("{}", header.join(" ").trim_end());

    for record in records {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| format!("{:<width$}", record.display_or(&c.field, "N/A"), width = c.width))
            .collect();
        println!("{}", cells.join(" ").trim_end());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_view_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Show { source, view, page } => {
            let (mut table, config) = build_table(&source, &view, config).await?;
            if let Some(message) = table.error() {
                println!("{message}");
                return Ok(());
            }

            table.go_to_page(page);
            let page = table.page();
            if page.records.is_empty() {
                println!("No records match the current filters.");
            } else {
                print_rows(&page.records, &config, table.sort_state());
            }
            println!("{} ({} records)", page.label(), page.total_records);
        }
        Commands::Analyze { source, view, range } => {
            let (table, config) = build_table(&source, &view, config).await?;
            if let Some(message) = table.error() {
                println!("{message}");
                return Ok(());
            }

            let distribution = table.distribution();
            let summary = &distribution.summary;
            println!("Results: {}", summary.total_users);
            println!("Average: {}", summary.average_display());
            println!("Highest: {}  Lowest: {}", summary.max, summary.min);
            println!(
                "Passing: {}  Failing: {}  Pass rate: {}%",
                summary.passing_students,
                summary.failing_students,
                summary.pass_percentage_display()
            );

            match range {
                Some(index) => {
                    let bucket = distribution
                        .range_at(index)
                        .with_context(|| format!("no score range at index {index}"))?;
                    println!("Range {} ({} members):", bucket.label, bucket.count());
                    print_rows(&bucket.members, &config, table.sort_state());
                }
                None => {
                    for (index, bucket) in distribution.all_ranges().iter().enumerate() {
                        if bucket.count() > 0 {
                            println!("[{index}] {}: {}", bucket.label, bucket.count());
                        }
                    }
                }
            }
        }
        Commands::Export {
            source,
            view,
            format,
            file_name,
            sheet,
            out_dir,
        } => {
            let (table, config) = build_table(&source, &view, config).await?;
            if let Some(message) = table.error() {
                println!("{message}");
                return Ok(());
            }

            let rows = table.visible();
            let file_name = file_name.unwrap_or_else(|| config.file_name.clone());
            let written = match format {
                ExportFormat::Xlsx => export::export_xlsx(
                    &rows,
                    &config.columns,
                    &file_name,
                    sheet.as_deref().unwrap_or(&config.sheet_name),
                    &out_dir,
                )?,
                ExportFormat::Csv => {
                    export::export_csv(&rows, &config.columns, &file_name, &out_dir)?
                }
            };

            match written {
                Some(path) => println!("Exported {} rows to {}.", rows.len(), path.display()),
                None => println!("Nothing to export."),
            }
        }
        Commands::Report {
            source,
            view,
            title,
            out,
        } => {
            let (table, config) = build_table(&source, &view, config).await?;
            if let Some(message) = table.error() {
                println!("{message}");
                return Ok(());
            }

            let rows = table.visible();
            let distribution = table.distribution();
            let report = report::build_report(
                &title,
                &distribution,
                &rows,
                &config.score_field,
                &config.name_field,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
