//! Search, filter, sort, paginate, bucket and export server-provided result tables.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod filter;
pub mod models;
pub mod paginate;
pub mod report;
pub mod scores;
pub mod sort;
pub mod store;
pub mod table;

pub use error::{Result, TableError};
pub use models::{AuthContext, Envelope, Record, Value};
pub use table::ResultTable;
