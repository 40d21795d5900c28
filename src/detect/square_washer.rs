//! Square washer detector
//!
//! The outline is the dominant non-round quadrilateral in the ROI, sized from
//! its minimum-area rectangle. The bore is searched among circle candidates
//! first and threshold contours second; both paths score candidates on how
//! well centred they are and reject anything below a fixed score.

use crate::core::calibration::CalibrationState;
use crate::core::geometry::{self, Circle, Point2};
use crate::detect::params::SquareWasherParams;
use crate::detect::{ContourStats, Roi, ShapeDetector};
use crate::entities::measurement::TypedMeasurement;
use crate::entities::part::PartType;

#[derive(Debug, Clone, Default)]
pub struct SquareWasherDetector {
    params: SquareWasherParams,
}

/// Outline accepted for measurement
struct Outline<'a> {
    stats: ContourStats<'a>,
    center: Point2,
    width: f64,
    height: f64,
}

impl<'a> Outline<'a> {
    fn short_side(&self) -> f64 {
        self.width.min(self.height)
    }

    fn contains(&self, p: &Point2) -> bool {
        geometry::point_in_polygon(p, self.stats.points)
    }
}

impl SquareWasherDetector {
    pub fn new(params: SquareWasherParams) -> Self {
        Self { params }
    }

    fn outline<'a>(&self, roi: &'a Roi) -> Option<Outline<'a>> {
        let p = &self.params;
        let min_area = p.min_area_fraction * roi.area();

        let stats = roi
            .contours
            .iter()
            .map(|points| ContourStats::new(points))
            .filter(|s| s.area > min_area)
            .max_by(|a, b| a.area.total_cmp(&b.area))?;

        if stats.circularity > p.max_circularity {
            tracing::debug!(circularity = stats.circularity, "square outline too round");
            return None;
        }

        let vertices = stats.approx_vertices(p.approx_epsilon_fraction);
        if vertices < p.vertices.0 || vertices > p.vertices.1 {
            tracing::debug!(vertices, "square outline vertex count out of range");
            return None;
        }

        let rect = geometry::min_area_rect(stats.points)?;
        if rect.width < p.min_side_px || rect.height < p.min_side_px {
            return None;
        }

        let (mut width, mut height) = if rect.width >= rect.height {
            (rect.width, rect.height)
        } else {
            (rect.height, rect.width)
        };
        if width / height <= 1.0 + p.symmetry_tolerance {
            let side = (width + height) / 2.0;
            width = side;
            height = side;
        }

        let center = stats.centroid().unwrap_or(rect.center);
        Some(Outline {
            stats,
            center,
            width,
            height,
        })
    }

    fn bore_from_circles(&self, roi: &Roi, outline: &Outline) -> Option<Circle> {
        let p = &self.params;
        let max_dist = outline.short_side() * p.bore_center_fraction;

        roi.circles
            .iter()
            .filter(|c| outline.contains(&c.center))
            .filter_map(|c| {
                let dist = c.center.distance(outline.center);
                let ratio = c.area() / outline.stats.area;
                if dist >= max_dist || ratio <= p.bore_area_ratio.0 || ratio >= p.bore_area_ratio.1 {
                    return None;
                }
                let center_score = 1.0 - dist / max_dist;
                let size_score = if ratio > p.bore_ideal_area_ratio.0 && ratio < p.bore_ideal_area_ratio.1 {
                    1.0
                } else {
                    0.7
                };
                Some((center_score * 0.85 + size_score * 0.15, *c))
            })
            .filter(|(score, _)| *score > p.circle_score_threshold)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, c)| c)
    }

    fn bore_from_threshold(&self, roi: &Roi, outline: &Outline) -> Option<Circle> {
        let p = &self.params;
        let max_dist = outline.short_side() * p.bore_center_fraction;

        roi.threshold_contours
            .iter()
            .map(|points| ContourStats::new(points))
            .filter_map(|hole| {
                let ratio = hole.area / outline.stats.area;
                if ratio <= p.bore_area_ratio.0 || ratio >= p.bore_area_ratio.1 {
                    return None;
                }
                if hole.circularity <= p.hole_min_circularity {
                    return None;
                }
                let centroid = hole.centroid()?;
                if !outline.contains(&centroid) {
                    return None;
                }
                let dist = centroid.distance(outline.center);
                if dist >= max_dist {
                    return None;
                }
                let score = hole.circularity * 0.6 + (1.0 - dist / max_dist) * 0.4;
                Some((score, hole))
            })
            .filter(|(score, _)| *score > p.contour_score_threshold)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .and_then(|(_, hole)| hole.enclosing_circle())
    }
}

impl ShapeDetector for SquareWasherDetector {
    fn part_type(&self) -> PartType {
        PartType::SquareWasher
    }

    fn detect(&self, roi: &Roi, _calibration: &CalibrationState) -> Option<TypedMeasurement> {
        let outline = self.outline(roi)?;
        let bore = self
            .bore_from_circles(roi, &outline)
            .or_else(|| self.bore_from_threshold(roi, &outline));

        Some(TypedMeasurement::Square {
            width_px: outline.width,
            height_px: outline.height,
            bore_px: bore.map(|c| c.diameter()),
        })
    }
}
