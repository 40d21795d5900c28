//! Dimension matcher and tolerance engine
//!
//! A matched dimension passes only if it is inside BOTH the absolute and the
//! relative tolerance. A record is `DEFECTIVE` as soon as one matched
//! dimension fails.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::entities::comparison::{ComparisonRecord, ComparisonReport, DimensionComparison, Verdict};
use crate::entities::measurement::Measurement;
use crate::entities::part::{Dimension, PartSpec};
use crate::store::MeasurementRow;

/// Default absolute tolerance (mm)
pub const ABS_TOL_MM: f64 = 2.0;

/// Default relative tolerance (percent of nominal)
pub const REL_TOL_PCT: f64 = 20.0;

#[derive(Debug, Error, Diagnostic)]
pub enum ValidationError {
    #[error("No measured dimension matches the nominal dimensions ({nominal})")]
    #[diagnostic(
        code(dimspect::compare::validation),
        help("Measured columns must be named after the dimension vocabulary, e.g. outer_diameter_mm")
    )]
    NoMatchedDimensions { nominal: String },
}

impl ValidationError {
    fn for_spec(spec: &PartSpec) -> Self {
        let nominal = spec
            .dimensions
            .keys()
            .map(|d| d.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        ValidationError::NoMatchedDimensions { nominal }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    pub abs_tol_mm: f64,
    pub rel_tol_pct: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            abs_tol_mm: ABS_TOL_MM,
            rel_tol_pct: REL_TOL_PCT,
        }
    }
}

impl ToleranceConfig {
    /// Compare one measured value against its nominal
    pub fn evaluate(&self, dimension: Dimension, cad_mm: f64, measured_mm: f64) -> DimensionComparison {
        let abs_err_mm = (measured_mm - cad_mm).abs();
        let rel_err_pct = if cad_mm == 0.0 {
            0.0
        } else {
            abs_err_mm / cad_mm.abs() * 100.0
        };

        DimensionComparison {
            dimension,
            cad_mm,
            measured_mm,
            abs_err_mm,
            rel_err_pct,
            pass: abs_err_mm <= self.abs_tol_mm && rel_err_pct <= self.rel_tol_pct,
        }
    }
}

/// Compare a measurement against the session nominal.
pub fn compare(
    measurement: &Measurement,
    spec: &PartSpec,
    tolerance: &ToleranceConfig,
) -> Result<ComparisonRecord, ValidationError> {
    let pairs = measurement
        .dimensions
        .iter()
        .map(|(d, v)| (*d, *v));
    build_record(measurement.timestamp, pairs, spec, tolerance)
}

/// Compare raw measurement-log columns against the nominal.
///
/// Column names are paired with nominal dimensions by
/// [`PartSpec::match_dimension`] (exact or vocabulary-prefix names only);
/// columns that pair with nothing are dropped.
/// If two columns pair with the same dimension the first one wins.
pub fn compare_columns<'a>(
    timestamp: DateTime<Utc>,
    columns: impl IntoIterator<Item = (&'a str, f64)>,
    spec: &PartSpec,
    tolerance: &ToleranceConfig,
) -> Result<ComparisonRecord, ValidationError> {
    let pairs = columns
        .into_iter()
        .filter_map(|(name, value)| spec.match_dimension(name).map(|d| (d, value)));
    build_record(timestamp, pairs, spec, tolerance)
}

/// Compare a whole measurement log.
///
/// Rows that match nothing in the nominal are logged and counted in
/// `stats.skipped`; they never abort the report.
pub fn compare_log(rows: &[MeasurementRow], spec: &PartSpec, tolerance: &ToleranceConfig) -> ComparisonReport {
    let mut skipped = 0;
    let records = rows
        .iter()
        .filter_map(|row| match compare_columns(row.timestamp, row.columns(), spec, tolerance) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(row = row.row, error = %e, "skipping measurement row");
                skipped += 1;
                None
            }
        })
        .collect();
    ComparisonReport::new(records, skipped)
}

fn build_record(
    timestamp: DateTime<Utc>,
    measured: impl Iterator<Item = (Dimension, f64)>,
    spec: &PartSpec,
    tolerance: &ToleranceConfig,
) -> Result<ComparisonRecord, ValidationError> {
    let mut seen = BTreeSet::new();
    let mut per_dimension: Vec<DimensionComparison> = measured
        .filter(|(d, v)| v.is_finite() && seen.insert(*d))
        .filter_map(|(d, v)| spec.get(d).map(|cad| tolerance.evaluate(d, cad, v)))
        .collect();
    per_dimension.sort_by_key(|c| c.dimension);

    if per_dimension.is_empty() {
        return Err(ValidationError::for_spec(spec));
    }

    let status = if per_dimension.iter().all(|c| c.pass) {
        Verdict::NotDefective
    } else {
        Verdict::Defective
    };

    Ok(ComparisonRecord {
        timestamp,
        per_dimension,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::part::PartType;
    use std::collections::BTreeMap;

    fn bearing_spec() -> PartSpec {
        PartSpec::new(
            PartType::Bearing,
            [(Dimension::OuterDiameter, 30.0), (Dimension::InnerDiameter, 14.0)],
        )
        .unwrap()
    }

    fn measurement(dims: &[(Dimension, f64)]) -> Measurement {
        Measurement {
            timestamp: Utc::now(),
            part_type: PartType::Bearing,
            dimensions: dims.iter().copied().collect(),
            pixels: BTreeMap::new(),
            mm_per_px: None,
        }
    }

    #[test]
    fn test_within_both_tolerances_passes() {
        let rec = compare(
            &measurement(&[(Dimension::OuterDiameter, 31.5)]),
            &bearing_spec(),
            &ToleranceConfig::default(),
        )
        .unwrap();

        let od = rec.get(Dimension::OuterDiameter).unwrap();
        assert!((od.abs_err_mm - 1.5).abs() < 1e-9);
        assert!((od.rel_err_pct - 5.0).abs() < 1e-9);
        assert!(od.pass);
        assert_eq!(rec.status, Verdict::NotDefective);
    }

    #[test]
    fn test_abs_tolerance_breach_is_defective() {
        let rec = compare(
            &measurement(&[(Dimension::OuterDiameter, 34.5), (Dimension::InnerDiameter, 14.1)]),
            &bearing_spec(),
            &ToleranceConfig::default(),
        )
        .unwrap();

        let od = rec.get(Dimension::OuterDiameter).unwrap();
        assert!((od.abs_err_mm - 4.5).abs() < 1e-9);
        assert!(!od.pass);
        assert!(rec.get(Dimension::InnerDiameter).unwrap().pass);
        assert_eq!(rec.status, Verdict::Defective);
        assert_eq!(rec.failing().count(), 1);
    }

    #[test]
    fn test_rel_tolerance_alone_can_fail() {
        // 1.5 mm on a 5 mm bore: inside abs, 30% rel
        let spec = PartSpec::new(PartType::Washer, [(Dimension::InnerDiameter, 5.0)]).unwrap();
        let rec = compare(
            &measurement(&[(Dimension::InnerDiameter, 6.5)]),
            &spec,
            &ToleranceConfig::default(),
        )
        .unwrap();
        assert_eq!(rec.status, Verdict::Defective);
    }

    #[test]
    fn test_zero_nominal_has_zero_rel_err() {
        let c = ToleranceConfig::default().evaluate(Dimension::OuterWidth, 0.0, 1.0);
        assert_eq!(c.rel_err_pct, 0.0);
        assert!(c.pass);
    }

    #[test]
    fn test_no_match_is_validation_error() {
        let spec = PartSpec::new(PartType::HexNut, [(Dimension::AcrossFlats, 25.0)]).unwrap();
        let err = compare(
            &measurement(&[(Dimension::OuterDiameter, 30.0)]),
            &spec,
            &ToleranceConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("across_flats"));
    }

    #[test]
    fn test_columns_resolve_by_name() {
        let rec = compare_columns(
            Utc::now(),
            [
                ("Outer_Diameter_mm", 30.4),
                ("outer_diameter_avg_mm", 99.0),
                ("confidence", 0.9),
                ("inner_diameter_mm", 13.8),
            ],
            &bearing_spec(),
            &ToleranceConfig::default(),
        )
        .unwrap();

        assert_eq!(rec.per_dimension.len(), 2);
        assert!((rec.get(Dimension::OuterDiameter).unwrap().measured_mm - 30.4).abs() < 1e-9);
        assert_eq!(rec.status, Verdict::NotDefective);
    }

    #[test]
    fn test_foreign_columns_never_pair_by_substring() {
        let square = PartSpec::new(
            PartType::SquareWasher,
            [
                (Dimension::OuterWidth, 40.0),
                (Dimension::OuterHeight, 40.0),
                (Dimension::InnerDiameter, 12.0),
            ],
        )
        .unwrap();

        let result = compare_columns(Utc::now(), [("id_mm", 12.0)], &square, &ToleranceConfig::default());
        assert!(result.is_err());

        let rec = compare_columns(
            Utc::now(),
            [("id_mm", 12.0), ("outer_width_mm", 40.2)],
            &square,
            &ToleranceConfig::default(),
        )
        .unwrap();
        assert_eq!(rec.per_dimension.len(), 1);
        assert_eq!(rec.per_dimension[0].dimension, Dimension::OuterWidth);
        assert_eq!(rec.status, Verdict::NotDefective);
    }

    #[test]
    fn test_custom_tolerance() {
        let tight = ToleranceConfig {
            abs_tol_mm: 0.1,
            rel_tol_pct: 1.0,
        };
        let rec = compare(
            &measurement(&[(Dimension::OuterDiameter, 30.5)]),
            &bearing_spec(),
            &tight,
        )
        .unwrap();
        assert_eq!(rec.status, Verdict::Defective);
    }

    #[test]
    fn test_compare_log_counts_skipped_rows() {
        let row = |n: usize, cols: &[(&str, f64)]| MeasurementRow {
            row: n,
            timestamp: Utc::now(),
            columns: cols.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        };
        let rows = vec![
            row(1, &[("outer_diameter_mm", 30.4), ("inner_diameter_mm", 14.1)]),
            row(2, &[("across_flats_mm", 25.0)]),
            row(3, &[("outer_diameter_mm", 34.5)]),
        ];

        let report = compare_log(&rows, &bearing_spec(), &ToleranceConfig::default());
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.stats.skipped, 1);
        assert_eq!(report.stats.defective, 1);
        assert_eq!(report.final_verdict(), Some(Verdict::Defective));
    }
}
