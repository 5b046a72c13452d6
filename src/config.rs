use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TableError};
use crate::export::ColumnMap;
use crate::paginate::DEFAULT_PAGE_SIZE;
use crate::scores::{default_ranges, RangeBounds, DEFAULT_PASS_MARK};
use crate::store::DEFAULT_ID_FIELDS;

/// View file as written by users; every key is optional.
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub page_size: Option<usize>,
    pub score_field: Option<String>,
    pub name_field: Option<String>,
    pub pass_mark: Option<f64>,
    pub id_fields: Option<Vec<String>>,
    pub ranges: Option<Vec<RangeBounds>>,
    #[serde(alias = "header_map")]
    pub columns: Option<ColumnMap>,
    pub sheet_name: Option<String>,
    pub file_name: Option<String>,
    pub endpoint: Option<String>,
}

/// Resolved settings for one result table.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub page_size: usize,
    pub score_field: String,
    pub name_field: String,
    pub pass_mark: f64,
    pub id_fields: Vec<String>,
    pub ranges: Vec<RangeBounds>,
    pub columns: ColumnMap,
    pub sheet_name: String,
    pub file_name: String,
    pub endpoint: Option<String>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            score_field: "percentage".to_string(),
            name_field: "traineeName".to_string(),
            pass_mark: DEFAULT_PASS_MARK,
            id_fields: DEFAULT_ID_FIELDS.iter().map(|f| f.to_string()).collect(),
            ranges: default_ranges(),
            columns: ColumnMap::default(),
            sheet_name: "Results".to_string(),
            file_name: "results".to_string(),
            endpoint: None,
        }
    }
}

impl ViewConfig {
    pub fn from_file(file: ConfigFile) -> Result<Self> {
        let defaults = ViewConfig::default();
        let config = Self {
            page_size: file.page_size.unwrap_or(defaults.page_size),
            score_field: file.score_field.unwrap_or(defaults.score_field),
            name_field: file.name_field.unwrap_or(defaults.name_field),
            pass_mark: file.pass_mark.unwrap_or(defaults.pass_mark),
            id_fields: file
                .id_fields
                .filter(|fields| !fields.is_empty())
                .unwrap_or(defaults.id_fields),
            ranges: file.ranges.unwrap_or(defaults.ranges),
            columns: file.columns.unwrap_or(defaults.columns),
            sheet_name: file.sheet_name.unwrap_or(defaults.sheet_name),
            file_name: file.file_name.unwrap_or(defaults.file_name),
            endpoint: file.endpoint,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(TableError::ZeroPageSize);
        }
        if !(0.0..=100.0).contains(&self.pass_mark) {
            return Err(TableError::InvalidConfig(format!(
                "pass_mark {} must be within 0-100",
                self.pass_mark
            )));
        }
        for range in &self.ranges {
            RangeBounds::new(range.label.clone(), range.min, range.max)?;
        }
        if self.score_field.trim().is_empty() {
            return Err(TableError::InvalidConfig(
                "score_field must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".result-table").join("view.yml"))
}

pub fn parse_config(contents: &str) -> Result<ViewConfig> {
    let file: ConfigFile = serde_yaml::from_str(contents)?;
    ViewConfig::from_file(file)
}

/// A missing file is only tolerated when `allow_missing` is set.
pub fn load_config(path: &Path, allow_missing: bool) -> Result<ViewConfig> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            tracing::debug!(path = %path.display(), "no view config; using defaults");
            Ok(ViewConfig::default())
        }
        Err(e) => Err(TableError::io(path, e)),
    }
}
