//! Comparison report table
//!
//! One row per record. For every dimension present in the report the row
//! carries `CAD_<dim>_mm`, `MEAS_<dim>_mm`, `<dim>_mm_abs_err` and
//! `<dim>_mm_rel_err_percent`; the row ends with `status`. A record that
//! did not match a dimension leaves those cells empty.

use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::fs::File;
use std::path::Path;

use crate::entities::comparison::{ComparisonRecord, ComparisonReport, DimensionComparison, Verdict};
use crate::entities::part::Dimension;
use crate::inspect::compare::ToleranceConfig;
use crate::store::{
    ensure_parent, format_timestamp, get_field, header_map, parse_number, parse_timestamp,
    StoreError,
};

struct ColumnNames {
    cad: String,
    meas: String,
    abs_err: String,
    rel_err: String,
}

impl ColumnNames {
    fn for_dimension(dimension: Dimension) -> Self {
        let stem = format!("{}_mm", dimension.as_str());
        Self {
            cad: format!("CAD_{}", stem),
            meas: format!("MEAS_{}", stem),
            abs_err: format!("{}_abs_err", stem),
            rel_err: format!("{}_rel_err_percent", stem),
        }
    }
}

pub fn write_report(path: &Path, report: &ComparisonReport) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let dimensions = report.dimensions();
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .map_err(|e| StoreError::csv(path, e))?;

    let mut header = vec!["timestamp".to_string()];
    for d in &dimensions {
        let names = ColumnNames::for_dimension(*d);
        header.extend([names.cad, names.meas, names.abs_err, names.rel_err]);
    }
    header.push("status".to_string());
    wtr.write_record(&header)
        .map_err(|e| StoreError::csv(path, e))?;

    for record in &report.records {
        let mut row = vec![format_timestamp(&record.timestamp)];
        for d in &dimensions {
            match record.get(*d) {
                Some(c) => row.extend([
                    c.cad_mm.to_string(),
                    c.measured_mm.to_string(),
                    c.abs_err_mm.to_string(),
                    c.rel_err_pct.to_string(),
                ]),
                None => row.extend(std::iter::repeat(String::new()).take(4)),
            }
        }
        row.push(record.status.to_string());
        wtr.write_record(&row)
            .map_err(|e| StoreError::csv(path, e))?;
    }

    wtr.flush().map_err(|e| StoreError::io(path, e))
}

/// Read a report back.
///
/// Per-dimension pass flags are not stored, so they are re-derived from the
/// recorded errors with `tolerance`.
pub fn read_report(path: &Path, tolerance: &ToleranceConfig) -> Result<Vec<ComparisonRecord>, StoreError> {
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);

    let headers = header_map(rdr.headers().map_err(|e| StoreError::csv(path, e))?);
    for column in ["timestamp", "status"] {
        if !headers.contains_key(column) {
            return Err(StoreError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }

    let columns: Vec<(Dimension, ColumnNames)> = Dimension::all()
        .iter()
        .map(|d| (*d, ColumnNames::for_dimension(*d)))
        .filter(|(_, names)| headers.contains_key(&names.cad.to_lowercase()))
        .collect();

    let mut records = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let row = idx + 2;
        let record = result.map_err(|e| StoreError::csv(path, e))?;
        let invalid = |column: &str, value: &str| StoreError::InvalidValue {
            path: path.to_path_buf(),
            row,
            column: column.to_string(),
            value: value.to_string(),
        };

        let ts_raw = get_field(&record, &headers, "timestamp").unwrap_or_default();
        let timestamp = parse_timestamp(ts_raw).ok_or_else(|| invalid("timestamp", ts_raw))?;
        let status_raw = get_field(&record, &headers, "status").unwrap_or_default();
        let status: Verdict = status_raw
            .parse()
            .map_err(|_| invalid("status", status_raw))?;

        let mut per_dimension = Vec::new();
        for (dimension, names) in &columns {
            let number = |column: &str| -> Result<Option<f64>, StoreError> {
                get_field(&record, &headers, column)
                    .map(|raw| parse_number(path, row, column, raw))
                    .transpose()
            };
            let (Some(cad_mm), Some(measured_mm)) = (number(&names.cad)?, number(&names.meas)?)
            else {
                continue;
            };
            let abs_err_mm = number(&names.abs_err)?.unwrap_or((measured_mm - cad_mm).abs());
            let rel_err_pct = match number(&names.rel_err)? {
                Some(v) => v,
                None => tolerance.evaluate(*dimension, cad_mm, measured_mm).rel_err_pct,
            };

            per_dimension.push(DimensionComparison {
                dimension: *dimension,
                cad_mm,
                measured_mm,
                abs_err_mm,
                rel_err_pct,
                pass: abs_err_mm <= tolerance.abs_tol_mm && rel_err_pct <= tolerance.rel_tol_pct,
            });
        }

        records.push(ComparisonRecord {
            timestamp,
            per_dimension,
            status,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::part::{PartSpec, PartType};
    use crate::inspect::compare::compare_columns;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    fn sample_report() -> ComparisonReport {
        let spec = PartSpec::new(
            PartType::SquareWasher,
            [
                (Dimension::OuterWidth, 40.0),
                (Dimension::OuterHeight, 40.0),
                (Dimension::InnerDiameter, 13.0),
            ],
        )
        .unwrap();
        let tol = ToleranceConfig::default();
        let records = vec![
            compare_columns(
                Utc::now(),
                [("outer_width_mm", 40.3), ("outer_height_mm", 39.9), ("inner_diameter_mm", 13.1)],
                &spec,
                &tol,
            )
            .unwrap(),
            compare_columns(
                Utc::now(),
                [("outer_width_mm", 43.123456789), ("outer_height_mm", 41.0)],
                &spec,
                &tol,
            )
            .unwrap(),
        ];
        ComparisonReport::new(records, 0)
    }

    #[test]
    fn test_header_layout() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.csv");
        write_report(&path, &sample_report()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with(
            "timestamp,CAD_inner_diameter_mm,MEAS_inner_diameter_mm,inner_diameter_mm_abs_err,inner_diameter_mm_rel_err_percent,CAD_outer_width_mm"
        ));
        assert!(header.ends_with(",status"));
        assert!(text.contains("NOT DEFECTIVE"));
        assert!(text.lines().nth(2).unwrap().ends_with(",DEFECTIVE"));
    }

    #[test]
    fn test_round_trip_preserves_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.csv");
        let report = sample_report();
        write_report(&path, &report).unwrap();

        let back = read_report(&path, &ToleranceConfig::default()).unwrap();
        assert_eq!(back.len(), report.records.len());
        for (a, b) in report.records.iter().zip(&back) {
            assert!((a.timestamp - b.timestamp).num_microseconds().unwrap().abs() < 1);
            assert_eq!(a.status, b.status);
            assert_eq!(a.per_dimension.len(), b.per_dimension.len());
            for (x, y) in a.per_dimension.iter().zip(&b.per_dimension) {
                assert_eq!(x.dimension, y.dimension);
                assert!((x.cad_mm - y.cad_mm).abs() < 1e-6);
                assert!((x.measured_mm - y.measured_mm).abs() < 1e-6);
                assert!((x.abs_err_mm - y.abs_err_mm).abs() < 1e-6);
                assert!((x.rel_err_pct - y.rel_err_pct).abs() < 1e-6);
                assert_eq!(x.pass, y.pass);
            }
        }
    }

    #[test]
    fn test_read_accepts_underscore_status() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.csv");
        fs::write(
            &path,
            "timestamp,CAD_outer_diameter_mm,MEAS_outer_diameter_mm,status\n\
             2025-01-01 10:00:00,30,31.5,NOT_DEFECTIVE\n",
        )
        .unwrap();

        let back = read_report(&path, &ToleranceConfig::default()).unwrap();
        let od = back[0].get(Dimension::OuterDiameter).unwrap();
        assert!((od.abs_err_mm - 1.5).abs() < 1e-9);
        assert!((od.rel_err_pct - 5.0).abs() < 1e-9);
        assert_eq!(back[0].status, Verdict::NotDefective);
    }

    #[test]
    fn test_read_rejects_bad_status() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.csv");
        fs::write(&path, "timestamp,status\n2025-01-01 10:00:00,UNKNOWN\n").unwrap();
        assert!(matches!(
            read_report(&path, &ToleranceConfig::default()),
            Err(StoreError::InvalidValue { .. })
        ));
    }
}
