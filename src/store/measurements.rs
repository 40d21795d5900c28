//! Append-only measurement log
//!
//! Columns are `timestamp` followed by one `<dim>_mm` column per dimension of
//! the part type. The raw variant adds `<dim>_px` columns and the
//! `mm_per_px` scale in effect.

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Trim, Writer, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::entities::measurement::Measurement;
use crate::entities::part::{Dimension, PartType};
use crate::store::{ensure_parent, format_timestamp, header_map, parse_timestamp, StoreError};

pub struct MeasurementLog {
    path: PathBuf,
    dimensions: Vec<Dimension>,
    raw: bool,
    writer: Writer<File>,
    rows: usize,
}

impl std::fmt::Debug for MeasurementLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementLog")
            .field("path", &self.path)
            .field("raw", &self.raw)
            .field("rows", &self.rows)
            .finish()
    }
}

/// Header row for a part type
pub fn log_headers(part_type: PartType, raw: bool) -> Vec<String> {
    let dims = part_type.dimensions();
    let mut headers = vec!["timestamp".to_string()];
    headers.extend(dims.iter().map(|d| format!("{}_mm", d.as_str())));
    if raw {
        headers.extend(dims.iter().map(|d| format!("{}_px", d.as_str())));
        headers.push("mm_per_px".to_string());
    }
    headers
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl MeasurementLog {
    /// Open a log for appending, writing the header only when the file is new
    /// or empty.
    pub fn open(path: &Path, part_type: PartType, raw: bool) -> Result<Self, StoreError> {
        ensure_parent(path)?;
        let has_content = path.metadata().map(|m| m.len() > 0).unwrap_or(false);
        let headers = log_headers(part_type, raw);

        if has_content {
            let mut rdr = ReaderBuilder::new()
                .from_path(path)
                .map_err(|e| StoreError::csv(path, e))?;
            let existing: Vec<String> = rdr
                .headers()
                .map_err(|e| StoreError::csv(path, e))?
                .iter()
                .map(str::to_string)
                .collect();
            if existing != headers {
                tracing::warn!(
                    path = %path.display(),
                    "existing log has different columns; appending anyway"
                );
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if !has_content {
            writer
                .write_record(&headers)
                .map_err(|e| StoreError::csv(path, e))?;
            writer.flush().map_err(|e| StoreError::io(path, e))?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            dimensions: part_type.dimensions().to_vec(),
            raw,
            writer,
            rows: 0,
        })
    }

    /// Start a new log, discarding any previous content
    pub fn create(path: &Path, part_type: PartType, raw: bool) -> Result<Self, StoreError> {
        ensure_parent(path)?;
        File::create(path).map_err(|e| StoreError::io(path, e))?;
        Self::open(path, part_type, raw)
    }

    /// Append one measurement and flush, so readers see it immediately
    pub fn append(&mut self, measurement: &Measurement) -> Result<(), StoreError> {
        let mut record = vec![format_timestamp(&measurement.timestamp)];
        record.extend(self.dimensions.iter().map(|d| cell(measurement.get(*d))));
        if self.raw {
            record.extend(
                self.dimensions
                    .iter()
                    .map(|d| cell(measurement.pixels.get(d).copied())),
            );
            record.push(cell(measurement.mm_per_px));
        }

        self.writer
            .write_record(&record)
            .map_err(|e| StoreError::csv(&self.path, e))?;
        self.writer
            .flush()
            .map_err(|e| StoreError::io(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this handle
    pub fn rows_written(&self) -> usize {
        self.rows
    }
}

/// One log row: timestamp plus its `_mm` columns, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    pub row: usize,
    pub timestamp: DateTime<Utc>,
    pub columns: Vec<(String, f64)>,
}

impl MeasurementRow {
    pub fn columns(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns.iter().map(|(name, v)| (name.as_str(), *v))
    }
}

/// Read every row of a measurement log.
///
/// Only columns whose name ends in `_mm` are kept. Empty or non-numeric cells
/// are dropped; rows with an unreadable timestamp are skipped with a warning.
pub fn read_measurements(path: &Path) -> Result<Vec<MeasurementRow>, StoreError> {
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);

    let headers = rdr.headers().map_err(|e| StoreError::csv(path, e))?.clone();
    let index = header_map(&headers);
    let ts_idx = *index.get("timestamp").ok_or_else(|| StoreError::MissingColumn {
        path: path.to_path_buf(),
        column: "timestamp".to_string(),
    })?;
    let mm_columns: Vec<(usize, &str)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.trim().to_lowercase().ends_with("_mm"))
        .map(|(i, h)| (i, h.trim()))
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let row = idx + 2;
        let record = result.map_err(|e| StoreError::csv(path, e))?;

        let Some(timestamp) = record.get(ts_idx).and_then(parse_timestamp) else {
            tracing::warn!(row, "skipping measurement row with unreadable timestamp");
            continue;
        };

        let columns = mm_columns
            .iter()
            .filter_map(|(i, name)| {
                let value = record.get(*i)?.trim();
                if value.is_empty() {
                    return None;
                }
                match value.parse::<f64>() {
                    Ok(v) => Some((name.to_string(), v)),
                    Err(_) => {
                        tracing::warn!(row, column = *name, value, "dropping non-numeric cell");
                        None
                    }
                }
            })
            .collect();

        rows.push(MeasurementRow {
            row,
            timestamp,
            columns,
        });
    }

    Ok(rows)
}
