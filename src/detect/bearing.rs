//! Bearing detector: outer race plus a bore inside a fixed ratio window
//!
//! Until calibration locks, the largest candidate is the outer race and the
//! first candidate inside the ratio window is the bore. Once a scale exists
//! and `expected_outer_mm` / `expected_inner_mm` are set, each pick switches
//! to the candidate whose radius is closest to the expected pixel size.

use crate::core::calibration::CalibrationState;
use crate::core::geometry::Circle;
use crate::detect::params::BearingParams;
use crate::detect::{ContourStats, Roi, ShapeDetector};
use crate::entities::measurement::TypedMeasurement;
use crate::entities::part::PartType;

#[derive(Debug, Clone, Default)]
pub struct BearingDetector {
    params: BearingParams,
}

impl BearingDetector {
    pub fn new(params: BearingParams) -> Self {
        Self { params }
    }

    /// Circle candidates plus near-circular contours, in ROI order
    fn candidates(&self, roi: &Roi) -> Vec<Circle> {
        let mut out: Vec<Circle> = roi.circles.iter().filter(|c| c.radius > 0.0).copied().collect();
        out.extend(roi.contours.iter().filter_map(|points| {
            let stats = ContourStats::new(points);
            (stats.circularity >= self.params.min_circularity)
                .then(|| stats.enclosing_circle())
                .flatten()
        }));
        out
    }

    fn expected_radius_px(&self, mm: Option<f64>, calibration: &CalibrationState) -> Option<f64> {
        mm.and_then(|mm| calibration.to_px(mm)).map(|d| d / 2.0)
    }
}

fn closest_to(candidates: impl Iterator<Item = Circle>, radius: f64) -> Option<Circle> {
    candidates.min_by(|a, b| (a.radius - radius).abs().total_cmp(&(b.radius - radius).abs()))
}

impl ShapeDetector for BearingDetector {
    fn part_type(&self) -> PartType {
        PartType::Bearing
    }

    fn detect(&self, roi: &Roi, calibration: &CalibrationState) -> Option<TypedMeasurement> {
        let candidates = self.candidates(roi);

        let (outer_idx, outer) = match self.expected_radius_px(self.params.expected_outer_mm, calibration) {
            Some(expected) => candidates
                .iter()
                .enumerate()
                .min_by(|a, b| {
                    (a.1.radius - expected)
                        .abs()
                        .total_cmp(&(b.1.radius - expected).abs())
                })?,
            None => candidates
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.radius.total_cmp(&b.1.radius))?,
        };

        let (lo, hi) = self.params.bore_ratio;
        let window = candidates
            .iter()
            .enumerate()
            .filter(|(i, c)| {
                *i != outer_idx && c.radius >= lo * outer.radius && c.radius <= hi * outer.radius
            })
            .map(|(_, c)| *c);

        let inner = match self.expected_radius_px(self.params.expected_inner_mm, calibration) {
            Some(expected) => closest_to(window, expected),
            None => window.into_iter().next(),
        };

        let Some(inner) = inner else {
            tracing::debug!(outer_px = outer.diameter(), "bearing rejected: no bore in ratio window");
            return None;
        };

        Some(TypedMeasurement::Round {
            outer_px: outer.diameter(),
            inner_px: Some(inner.diameter()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::tests::{circle, ring};

    fn roi(circles: Vec<Circle>) -> Roi {
        Roi {
            width: 300.0,
            height: 300.0,
            circles,
            ..Default::default()
        }
    }

    #[test]
    fn test_largest_circle_is_outer() {
        let det = BearingDetector::default();
        let cal = CalibrationState::new();
        let m = det
            .detect(&roi(vec![circle(150.0, 150.0, 40.0), circle(150.0, 150.0, 90.0)]), &cal)
            .unwrap();
        assert_eq!(
            m,
            TypedMeasurement::Round {
                outer_px: 180.0,
                inner_px: Some(80.0)
            }
        );
    }

    #[test]
    fn test_rejects_without_bore_in_window() {
        let det = BearingDetector::default();
        let cal = CalibrationState::new();
        // 20/90 = 0.22, below the 0.3 floor
        assert!(det
            .detect(&roi(vec![circle(150.0, 150.0, 90.0), circle(150.0, 150.0, 20.0)]), &cal)
            .is_none());
        assert!(det.detect(&roi(vec![circle(150.0, 150.0, 90.0)]), &cal).is_none());
        assert!(det.detect(&roi(vec![]), &cal).is_none());
    }

    #[test]
    fn test_uses_near_circular_contours() {
        let det = BearingDetector::default();
        let cal = CalibrationState::new();
        let r = Roi {
            width: 300.0,
            height: 300.0,
            contours: vec![ring(150.0, 150.0, 100.0), ring(150.0, 150.0, 45.0)],
            ..Default::default()
        };
        match det.detect(&r, &cal).unwrap() {
            TypedMeasurement::Round { outer_px, inner_px } => {
                assert!((outer_px - 200.0).abs() < 1e-6);
                assert!((inner_px.unwrap() - 90.0).abs() < 1e-6);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_calibrated_prefers_expected_sizes() {
        let det = BearingDetector::default();
        let cal = CalibrationState::new();
        // 0.25 mm/px: expected OD 31 mm = 124 px (r 62), ID 14 mm = 56 px (r 28)
        cal.try_lock(124.0, 31.0).unwrap();

        let m = det
            .detect(
                &roi(vec![
                    circle(150.0, 150.0, 100.0),
                    circle(150.0, 150.0, 63.0),
                    circle(150.0, 150.0, 40.0),
                    circle(150.0, 150.0, 28.5),
                ]),
                &cal,
            )
            .unwrap();
        assert_eq!(
            m,
            TypedMeasurement::Round {
                outer_px: 126.0,
                inner_px: Some(57.0)
            }
        );
    }
}
