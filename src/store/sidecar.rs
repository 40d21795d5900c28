//! Live-status sidecar for external dashboards
//!
//! A small text file rewritten on every confident detection. Each rewrite
//! goes to a temporary sibling first and is renamed over the target, so a
//! reader never sees a half-written file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::entities::comparison::Verdict;
use crate::entities::measurement::Measurement;
use crate::store::{ensure_parent, StoreError};

#[derive(Debug, Clone)]
pub struct LiveStatus {
    path: PathBuf,
}

/// Sidecar text for one measurement
///
/// ```text
/// OBJECT: BEARING
/// OUTER DIAMETER: 30.52 mm
/// INNER DIAMETER: NA
/// STATUS: NOT DEFECTIVE
/// Timestamp: 2025-01-01T10:00:00.000000Z
/// ```
pub fn render(measurement: &Measurement, verdict: Option<Verdict>) -> String {
    let mut out = format!("OBJECT: {}\n", measurement.part_type.label());
    for dimension in measurement.part_type.dimensions() {
        match measurement.get(*dimension) {
            Some(mm) => out.push_str(&format!("{}: {:.2} mm\n", dimension.label(), mm)),
            None => out.push_str(&format!("{}: NA\n", dimension.label())),
        }
    }
    if let Some(verdict) = verdict {
        out.push_str(&format!("STATUS: {}\n", verdict));
    }
    out.push_str(&format!(
        "Timestamp: {}\n",
        crate::store::format_timestamp(&measurement.timestamp)
    ));
    out
}

impl LiveStatus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn update(&self, measurement: &Measurement, verdict: Option<Verdict>) -> Result<(), StoreError> {
        self.write_text(&render(measurement, verdict))
    }

    fn write_text(&self, text: &str) -> Result<(), StoreError> {
        ensure_parent(&self.path)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, text).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))
    }
}
