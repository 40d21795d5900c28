//! Round washer detector
//!
//! Outer boundary from the largest edge contour; bore from circle candidates
//! first, then from adaptive-threshold blobs inside the search box around the
//! outer centre.

use crate::core::calibration::CalibrationState;
use crate::core::geometry::{Circle, Point2};
use crate::detect::params::WasherParams;
use crate::detect::{ContourStats, Roi, ShapeDetector};
use crate::entities::measurement::TypedMeasurement;
use crate::entities::part::PartType;

#[derive(Debug, Clone, Default)]
pub struct WasherDetector {
    params: WasherParams,
}

impl WasherDetector {
    pub fn new(params: WasherParams) -> Self {
        Self { params }
    }

    fn outer(&self, roi: &Roi) -> Option<Circle> {
        let from_contour = roi
            .contours
            .iter()
            .map(|points| ContourStats::new(points))
            .filter(|s| s.area > 0.0)
            .max_by(|a, b| a.area.total_cmp(&b.area))
            .and_then(|s| s.enclosing_circle());

        from_contour.or_else(|| {
            roi.circles
                .iter()
                .copied()
                .max_by(|a, b| a.radius.total_cmp(&b.radius))
        })
    }

    fn in_window(&self, radius: f64, outer: &Circle) -> bool {
        let (lo, hi) = self.params.bore_ratio;
        radius > lo * outer.radius && radius < hi * outer.radius
    }

    /// Inside the square search box of half-size `hi * outer radius`
    fn in_search_box(&self, center: &Point2, outer: &Circle) -> bool {
        let half = self.params.bore_ratio.1 * outer.radius;
        (center.x - outer.center.x).abs() <= half && (center.y - outer.center.y).abs() <= half
    }

    fn bore_from_circles(&self, roi: &Roi, outer: &Circle) -> Option<Circle> {
        roi.circles
            .iter()
            .filter(|c| self.in_window(c.radius, outer) && self.in_search_box(&c.center, outer))
            .min_by(|a, b| {
                a.center
                    .distance(outer.center)
                    .total_cmp(&b.center.distance(outer.center))
            })
            .copied()
    }

    fn bore_from_threshold(&self, roi: &Roi, outer: &Circle) -> Option<Circle> {
        roi.threshold_contours
            .iter()
            .map(|points| ContourStats::new(points))
            .filter(|s| s.area >= self.params.min_bore_area_px)
            .filter_map(|s| s.enclosing_circle())
            .find(|c| self.in_window(c.radius, outer) && self.in_search_box(&c.center, outer))
    }
}

impl ShapeDetector for WasherDetector {
    fn part_type(&self) -> PartType {
        PartType::Washer
    }

    fn detect(&self, roi: &Roi, _calibration: &CalibrationState) -> Option<TypedMeasurement> {
        let outer = self.outer(roi)?;
        if outer.radius <= 0.0 {
            return None;
        }

        let bore = self
            .bore_from_circles(roi, &outer)
            .or_else(|| self.bore_from_threshold(roi, &outer));

        if bore.is_none() {
            tracing::debug!(outer_px = outer.diameter(), "washer bore not found");
        }

        Some(TypedMeasurement::Round {
            outer_px: outer.diameter(),
            inner_px: bore.map(|c| c.diameter()),
        })
    }
}
