use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("server rejected the request: {message}")]
    Rejected { message: String },

    #[error("payload entry {index} is not an object")]
    InvalidRecord { index: usize },

    #[error("page size must be a positive integer")]
    ZeroPageSize,

    #[error("invalid score range {label}: min {min} is greater than max {max}")]
    InvalidRange { label: String, min: f64, max: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl TableError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        TableError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TableError>;
