//! Measurement entity - one confident detection converted to millimeters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::calibration::{CalibrationError, CalibrationState};
use crate::entities::part::{Dimension, PartType};

/// Pixel-space result of a shape detector
///
/// Inner bores are optional for every family except bearings, whose
/// detector rejects a frame without a bore.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum TypedMeasurement {
    Round {
        outer_px: f64,
        inner_px: Option<f64>,
    },
    Square {
        width_px: f64,
        height_px: f64,
        bore_px: Option<f64>,
    },
    Hex {
        across_flats_px: f64,
        bore_px: Option<f64>,
    },
}

impl TypedMeasurement {
    /// Pixel values keyed by dimension
    pub fn pixel_dimensions(&self) -> BTreeMap<Dimension, f64> {
        let mut dims = BTreeMap::new();
        match *self {
            TypedMeasurement::Round { outer_px, inner_px } => {
                dims.insert(Dimension::OuterDiameter, outer_px);
                if let Some(inner) = inner_px {
                    dims.insert(Dimension::InnerDiameter, inner);
                }
            }
            TypedMeasurement::Square {
                width_px,
                height_px,
                bore_px,
            } => {
                dims.insert(Dimension::OuterWidth, width_px);
                dims.insert(Dimension::OuterHeight, height_px);
                if let Some(bore) = bore_px {
                    dims.insert(Dimension::InnerDiameter, bore);
                }
            }
            TypedMeasurement::Hex {
                across_flats_px,
                bore_px,
            } => {
                dims.insert(Dimension::AcrossFlats, across_flats_px);
                if let Some(bore) = bore_px {
                    dims.insert(Dimension::InnerDiameter, bore);
                }
            }
        }
        dims
    }

    pub fn pixel_value(&self, dimension: Dimension) -> Option<f64> {
        self.pixel_dimensions().get(&dimension).copied()
    }
}

/// A measurement in millimeters, appended to the measurement log and never
/// mutated afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub timestamp: DateTime<Utc>,

    pub part_type: PartType,

    pub dimensions: BTreeMap<Dimension, f64>,

    /// Pixel values the millimeter readings were derived from
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pixels: BTreeMap<Dimension, f64>,

    /// Scale in effect when the measurement was taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mm_per_px: Option<f64>,
}

impl Measurement {
    /// Convert a pixel-space detection with the session calibration.
    ///
    /// Fails with [`CalibrationError::Pending`] if the scale is not locked yet.
    pub fn from_pixels(
        part_type: PartType,
        typed: &TypedMeasurement,
        calibration: &CalibrationState,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, CalibrationError> {
        let scale = calibration.require_scale()?;
        let pixels = typed.pixel_dimensions();
        let dimensions = pixels.iter().map(|(d, px)| (*d, px * scale)).collect();

        Ok(Self {
            timestamp,
            part_type,
            dimensions,
            pixels,
            mm_per_px: Some(scale),
        })
    }

    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        self.dimensions.get(&dimension).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_dimensions_skip_missing_bore() {
        let typed = TypedMeasurement::Hex {
            across_flats_px: 120.0,
            bore_px: None,
        };
        let dims = typed.pixel_dimensions();
        assert_eq!(dims.len(), 1);
        assert_eq!(dims[&Dimension::AcrossFlats], 120.0);
    }

    #[test]
    fn test_from_pixels_requires_lock() {
        let state = CalibrationState::new();
        let typed = TypedMeasurement::Round {
            outer_px: 100.0,
            inner_px: Some(50.0),
        };
        assert!(Measurement::from_pixels(PartType::Bearing, &typed, &state, Utc::now()).is_err());
    }

    #[test]
    fn test_from_pixels_scales_every_dimension() {
        let state = CalibrationState::new();
        state.try_lock(100.0, 30.0).unwrap();

        let typed = TypedMeasurement::Square {
            width_px: 100.0,
            height_px: 80.0,
            bore_px: Some(40.0),
        };
        let m = Measurement::from_pixels(PartType::SquareWasher, &typed, &state, Utc::now())
            .unwrap();

        assert!((m.get(Dimension::OuterWidth).unwrap() - 30.0).abs() < 1e-9);
        assert!((m.get(Dimension::OuterHeight).unwrap() - 24.0).abs() < 1e-9);
        assert!((m.get(Dimension::InnerDiameter).unwrap() - 12.0).abs() < 1e-9);
        assert_eq!(m.pixels[&Dimension::OuterWidth], 100.0);
        assert_eq!(m.mm_per_px, Some(0.3));
    }
}
