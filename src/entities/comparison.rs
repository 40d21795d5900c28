//! Comparison entities - per-measurement verdicts and aggregate statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::entities::part::Dimension;

/// Overall verdict for one measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    NotDefective,
    Defective,
}

impl Verdict {
    /// Report spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::NotDefective => "NOT DEFECTIVE",
            Verdict::Defective => "DEFECTIVE",
        }
    }

    pub fn is_defective(&self) -> bool {
        matches!(self, Verdict::Defective)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('_', " ").as_str() {
            "NOT DEFECTIVE" => Ok(Verdict::NotDefective),
            "DEFECTIVE" => Ok(Verdict::Defective),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// One matched dimension inside a record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionComparison {
    pub dimension: Dimension,
    pub cad_mm: f64,
    pub measured_mm: f64,
    pub abs_err_mm: f64,
    pub rel_err_pct: f64,
    pub pass: bool,
}

/// Verdict for one measurement against the session nominal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub timestamp: DateTime<Utc>,
    pub per_dimension: Vec<DimensionComparison>,
    pub status: Verdict,
}

impl ComparisonRecord {
    pub fn get(&self, dimension: Dimension) -> Option<&DimensionComparison> {
        self.per_dimension.iter().find(|c| c.dimension == dimension)
    }

    pub fn failing(&self) -> impl Iterator<Item = &DimensionComparison> {
        self.per_dimension.iter().filter(|c| !c.pass)
    }
}

/// Error statistics for one dimension across a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionStats {
    pub count: usize,
    pub mean_abs_err_mm: f64,
    pub max_abs_err_mm: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportStats {
    pub total: usize,
    pub defective: usize,
    pub not_defective: usize,
    pub pass_rate_pct: f64,
    /// Measurements that matched no nominal dimension
    pub skipped: usize,
    pub per_dimension: BTreeMap<Dimension, DimensionStats>,
}

/// All records of a comparison run plus their aggregate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub records: Vec<ComparisonRecord>,
    pub stats: ReportStats,
}

impl ComparisonReport {
    pub fn new(records: Vec<ComparisonRecord>, skipped: usize) -> Self {
        let stats = ReportStats::from_records(&records, skipped);
        Self { records, stats }
    }

    /// Verdict of the most recent record
    pub fn final_verdict(&self) -> Option<Verdict> {
        self.records.last().map(|r| r.status)
    }

    /// Dimensions present in any record, in vocabulary order
    pub fn dimensions(&self) -> Vec<Dimension> {
        self.stats.per_dimension.keys().copied().collect()
    }
}

impl ReportStats {
    pub fn from_records(records: &[ComparisonRecord], skipped: usize) -> Self {
        let total = records.len();
        let defective = records.iter().filter(|r| r.status.is_defective()).count();
        let not_defective = total - defective;
        let pass_rate_pct = if total == 0 {
            0.0
        } else {
            not_defective as f64 / total as f64 * 100.0
        };

        let mut per_dimension: BTreeMap<Dimension, DimensionStats> = BTreeMap::new();
        for cmp in records.iter().flat_map(|r| &r.per_dimension) {
            let entry = per_dimension.entry(cmp.dimension).or_default();
            entry.count += 1;
            entry.mean_abs_err_mm += cmp.abs_err_mm;
            entry.max_abs_err_mm = entry.max_abs_err_mm.max(cmp.abs_err_mm);
        }
        for entry in per_dimension.values_mut() {
            entry.mean_abs_err_mm /= entry.count as f64;
        }

        Self {
            total,
            defective,
            not_defective,
            pass_rate_pct,
            skipped,
            per_dimension,
        }
    }
}
