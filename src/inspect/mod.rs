//! Inspection pipeline: frames in, measurements and verdicts out

pub mod compare;
pub mod frames;
pub mod session;
pub mod slot;

use chrono::{DateTime, Utc};

use crate::core::calibration::{CalibrationError, CalibrationState};
use crate::detect::{detector_for, DetectorParams, Roi};
use crate::entities::measurement::Measurement;
use crate::entities::part::PartType;

pub use compare::{compare, compare_columns, compare_log, ToleranceConfig, ValidationError};
pub use frames::FrameReader;
pub use session::{FrameOutcome, InspectionSession, RunOptions, SessionStats, SessionSummary};
pub use slot::LatestSlot;

/// One-shot detection of a single ROI with an existing calibration.
///
/// `Ok(None)` is a routine miss. A detection made before the scale is locked
/// fails with [`CalibrationError::Pending`]; sessions lock the scale from
/// their anchor before converting, see [`InspectionSession::process_roi`].
pub fn detect(
    part_type: PartType,
    roi: &Roi,
    calibration: &CalibrationState,
    params: &DetectorParams,
    timestamp: DateTime<Utc>,
) -> Result<Option<Measurement>, CalibrationError> {
    let detector = detector_for(part_type, params);
    detector
        .detect(roi, calibration)
        .map(|typed| Measurement::from_pixels(part_type, &typed, calibration, timestamp))
        .transpose()
}
