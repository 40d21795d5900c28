//! Measurement and report store
//!
//! Plain CSV tables plus the live-status sidecar. Tables are ordered and
//! append-only where the pipeline writes them incrementally.

pub mod measurements;
pub mod nominal;
pub mod report;
pub mod sidecar;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use csv::StringRecord;
use miette::Diagnostic;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use measurements::{read_measurements, MeasurementLog, MeasurementRow};
pub use nominal::{read_nominal, write_nominal};
pub use report::{read_report, write_report};
pub use sidecar::LiveStatus;

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("Failed to access {path}")]
    #[diagnostic(code(dimspect::store::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV in {path}")]
    #[diagnostic(code(dimspect::store::csv))]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} has no '{column}' column")]
    #[diagnostic(code(dimspect::store::missing_column))]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path} row {row}: invalid {column} value '{value}'")]
    #[diagnostic(code(dimspect::store::invalid_value))]
    InvalidValue {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
    },

    #[error("{path} contains no rows")]
    #[diagnostic(
        code(dimspect::store::empty),
        help("Run an inspection first so the table has data")
    )]
    Empty { path: PathBuf },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        StoreError::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Map from lower-cased header name to column index
pub(crate) fn header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect()
}

/// Non-empty trimmed field by header name
pub(crate) fn get_field<'r>(
    record: &'r StringRecord,
    headers: &HashMap<String, usize>,
    field: &str,
) -> Option<&'r str> {
    headers
        .get(&field.to_lowercase())
        .and_then(|&idx| record.get(idx))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS[.f]` taken as UTC
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub(crate) fn parse_number(
    path: &Path,
    row: usize,
    column: &str,
    value: &str,
) -> Result<f64, StoreError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| StoreError::InvalidValue {
            path: path.to_path_buf(),
            row,
            column: column.to_string(),
            value: value.to_string(),
        })
}

/// Create parent directories for an output file
pub(crate) fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))
        }
        _ => Ok(()),
    }
}
