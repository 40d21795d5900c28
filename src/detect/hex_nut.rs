//! Hex nut detector
//!
//! Across-flats is the median width of the convex hull measured along each
//! edge normal, which tolerates one or two damaged flats.

use crate::core::calibration::CalibrationState;
use crate::core::geometry::{self, Circle, Point2};
use crate::detect::params::HexNutParams;
use crate::detect::{ContourStats, Roi, ShapeDetector};
use crate::entities::measurement::TypedMeasurement;
use crate::entities::part::PartType;

#[derive(Debug, Clone, Default)]
pub struct HexNutDetector {
    params: HexNutParams,
}

impl HexNutDetector {
    pub fn new(params: HexNutParams) -> Self {
        Self { params }
    }

    fn is_hexagonal(&self, stats: &ContourStats) -> bool {
        let p = &self.params;
        if stats.area <= p.area_px.0 || stats.area >= p.area_px.1 {
            return false;
        }
        if geometry::solidity(stats.points) < p.min_solidity {
            return false;
        }
        let vertices = stats.approx_vertices(p.approx_epsilon_fraction);
        vertices >= p.vertices.0 && vertices <= p.vertices.1
    }

    /// Hex candidate whose centroid is closest to the ROI centre
    fn body<'a>(&self, roi: &'a Roi) -> Option<(ContourStats<'a>, Point2)> {
        let roi_center = roi.center();
        roi.contours
            .iter()
            .map(|points| ContourStats::new(points))
            .filter(|s| self.is_hexagonal(s))
            .filter_map(|s| s.centroid().map(|c| (s, c)))
            .min_by(|a, b| {
                a.1.distance(roi_center)
                    .total_cmp(&b.1.distance(roi_center))
            })
    }

    fn bore(&self, roi: &Roi, center: &Point2, across_flats: f64) -> Option<Circle> {
        let p = &self.params;
        let expected = p.expected_bore_ratio * across_flats;

        roi.threshold_contours
            .iter()
            .filter_map(|points| geometry::min_enclosing_circle(points))
            .chain(roi.circles.iter().copied())
            .filter(|c| {
                let d = c.diameter();
                d > p.bore_ratio.0 * across_flats
                    && d < p.bore_ratio.1 * across_flats
                    && c.center.distance(*center) <= p.concentricity_fraction * across_flats
            })
            .min_by(|a, b| {
                (a.diameter() - expected)
                    .abs()
                    .total_cmp(&(b.diameter() - expected).abs())
            })
    }
}

impl ShapeDetector for HexNutDetector {
    fn part_type(&self) -> PartType {
        PartType::HexNut
    }

    fn detect(&self, roi: &Roi, _calibration: &CalibrationState) -> Option<TypedMeasurement> {
        let (stats, center) = self.body(roi)?;
        let hull = geometry::convex_hull(stats.points);
        let across_flats = geometry::median(&geometry::edge_normal_spans(&hull))?;
        if across_flats <= 0.0 {
            return None;
        }

        let bore = self.bore(roi, &center, across_flats);
        if bore.is_none() {
            tracing::debug!(across_flats, "hex nut bore not found");
        }

        Some(TypedMeasurement::Hex {
            across_flats_px: across_flats,
            bore_px: bore.map(|c| c.diameter()),
        })
    }
}
