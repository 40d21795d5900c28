//! Pixel-to-millimeter calibration with lock-on-first-success semantics
//!
//! A session starts uncalibrated. The first detection that can be paired with
//! a physical reference fixes `mm_per_px` for the rest of the session; later
//! detections never move it, even if they look more confident. Recomputing the
//! scale every frame makes readings jitter, so the first anchor wins.
//!
//! The state is shared by reference between the detector and the comparison
//! step. The lock is a single compare-and-swap on the scale bits, so no mutex
//! is needed on the read path.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::entities::part::{Dimension, PartSpec};

/// Bit pattern of an unset scale (`0.0_f64`)
const UNSET: u64 = 0;

#[derive(Debug, Error, Diagnostic)]
pub enum CalibrationError {
    #[error("Calibration pending: no anchor has locked the pixel scale yet")]
    #[diagnostic(
        code(dimspect::calibration::pending),
        help("The first detection that can be paired with a reference dimension locks the scale")
    )]
    Pending,

    #[error("Invalid calibration reference: {reference_mm} mm over {reference_px} px")]
    #[diagnostic(code(dimspect::calibration::reference))]
    InvalidReference { reference_px: f64, reference_mm: f64 },

    #[error("Calibration anchor needs nominal '{0}' but the part spec has none")]
    #[diagnostic(code(dimspect::calibration::nominal))]
    MissingNominal(Dimension),
}

/// Session calibration state
///
/// `Default` is the unlocked state; a fresh pipeline run creates a new value.
#[derive(Debug, Default)]
pub struct CalibrationState {
    scale_bits: AtomicU64,
}

impl CalibrationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current scale, or `None` while pending
    pub fn get_scale(&self) -> Option<f64> {
        match self.scale_bits.load(Ordering::Acquire) {
            UNSET => None,
            bits => Some(f64::from_bits(bits)),
        }
    }

    /// Current scale, erroring while pending
    pub fn require_scale(&self) -> Result<f64, CalibrationError> {
        self.get_scale().ok_or(CalibrationError::Pending)
    }

    pub fn is_locked(&self) -> bool {
        self.get_scale().is_some()
    }

    /// Lock the scale to `reference_mm / reference_px` unless already locked.
    ///
    /// Returns the scale in effect after the call, which is the earlier value
    /// when the state was already locked.
    pub fn try_lock(&self, reference_px: f64, reference_mm: f64) -> Result<f64, CalibrationError> {
        if let Some(scale) = self.get_scale() {
            return Ok(scale);
        }

        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(reference_px) || !valid(reference_mm) {
            return Err(CalibrationError::InvalidReference {
                reference_px,
                reference_mm,
            });
        }

        let scale = reference_mm / reference_px;
        if !valid(scale) {
            return Err(CalibrationError::InvalidReference {
                reference_px,
                reference_mm,
            });
        }

        match self.scale_bits.compare_exchange(
            UNSET,
            scale.to_bits(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                tracing::info!(mm_per_px = scale, reference_px, reference_mm, "calibration locked");
                Ok(scale)
            }
            Err(existing) => Ok(f64::from_bits(existing)),
        }
    }

    /// Convert a pixel length with the locked scale
    pub fn to_mm(&self, px: f64) -> Result<f64, CalibrationError> {
        Ok(px * self.require_scale()?)
    }

    /// Convert a millimeter length back to pixels with the locked scale
    pub fn to_px(&self, mm: f64) -> Option<f64> {
        self.get_scale().map(|scale| mm / scale)
    }
}

/// Physical reference used to lock a part family's calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalibrationAnchor {
    /// A measured dimension whose physical size is known in advance
    Reference { dimension: Dimension, mm: f64 },

    /// Use the session's nominal CAD value for the dimension
    Nominal { dimension: Dimension },

    /// Fixed camera standoff: `scale = standoff_mm / focal_px`
    Focal { focal_px: f64, standoff_mm: f64 },
}

/// A pixel/millimeter pair ready to feed [`CalibrationState::try_lock`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorPair {
    pub reference_px: f64,
    pub reference_mm: f64,
}

impl CalibrationAnchor {
    /// Dimension the anchor measures against, if any
    pub fn dimension(&self) -> Option<Dimension> {
        match self {
            CalibrationAnchor::Reference { dimension, .. }
            | CalibrationAnchor::Nominal { dimension } => Some(*dimension),
            CalibrationAnchor::Focal { .. } => None,
        }
    }

    /// Pair the anchor with a detection's pixel reading.
    ///
    /// `Ok(None)` means this detection cannot anchor (e.g. the dimension was
    /// not measured in this frame).
    pub fn pair(
        &self,
        pixel_value: impl Fn(Dimension) -> Option<f64>,
        spec: &PartSpec,
    ) -> Result<Option<AnchorPair>, CalibrationError> {
        match *self {
            CalibrationAnchor::Focal {
                focal_px,
                standoff_mm,
            } => Ok(Some(AnchorPair {
                reference_px: focal_px,
                reference_mm: standoff_mm,
            })),
            CalibrationAnchor::Reference { dimension, mm } => {
                Ok(pixel_value(dimension).map(|px| AnchorPair {
                    reference_px: px,
                    reference_mm: mm,
                }))
            }
            CalibrationAnchor::Nominal { dimension } => {
                let mm = spec
                    .get(dimension)
                    .ok_or(CalibrationError::MissingNominal(dimension))?;
                Ok(pixel_value(dimension).map(|px| AnchorPair {
                    reference_px: px,
                    reference_mm: mm,
                }))
            }
        }
    }
}
