//! Shape detectors - one per part family behind a common capability
//!
//! Detectors consume the primitives an image-processing layer already pulled
//! out of one region of interest (Hough circles, edge contours, threshold
//! contours) and return a pixel-space [`TypedMeasurement`]. A frame without a
//! satisfying candidate yields `None`; that is the common case, not an error.

pub mod bearing;
pub mod hex_nut;
pub mod params;
pub mod square_washer;
pub mod washer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::calibration::CalibrationState;
use crate::core::geometry::{self, Circle, Point2};
use crate::entities::measurement::TypedMeasurement;
use crate::entities::part::PartType;

pub use bearing::BearingDetector;
pub use hex_nut::HexNutDetector;
pub use params::DetectorParams;
pub use square_washer::SquareWasherDetector;
pub use washer::WasherDetector;

/// Candidate primitives for one region of interest, in ROI pixel coordinates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roi {
    pub width: f64,
    pub height: f64,
    /// Circle-transform candidates
    pub circles: Vec<Circle>,
    /// Outer edge contours
    pub contours: Vec<Vec<Point2>>,
    /// Contours from adaptive/Otsu thresholding, used for bore fallbacks
    pub threshold_contours: Vec<Vec<Point2>>,
}

impl Roi {
    pub fn center(&self) -> Point2 {
        Point2::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// One camera frame after localization: zero or more regions of interest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub rois: Vec<Roi>,
}

/// Per-family detection capability
pub trait ShapeDetector: Send + Sync {
    fn part_type(&self) -> PartType;

    /// Measure one ROI in pixels, or `None` if nothing qualifies
    fn detect(&self, roi: &Roi, calibration: &CalibrationState) -> Option<TypedMeasurement>;
}

/// Select the detector for a classified part; fixed for the whole session
pub fn detector_for(part_type: PartType, params: &DetectorParams) -> Box<dyn ShapeDetector> {
    match part_type {
        PartType::Bearing => Box::new(BearingDetector::new(params.bearing.clone())),
        PartType::Washer => Box::new(WasherDetector::new(params.washer.clone())),
        PartType::SquareWasher => {
            Box::new(SquareWasherDetector::new(params.square_washer.clone()))
        }
        PartType::HexNut => Box::new(HexNutDetector::new(params.hex_nut.clone())),
    }
}

/// Shape statistics of a contour, computed once per candidate
#[derive(Debug, Clone)]
pub(crate) struct ContourStats<'a> {
    pub points: &'a [Point2],
    pub area: f64,
    pub perimeter: f64,
    pub circularity: f64,
}

impl<'a> ContourStats<'a> {
    pub fn new(points: &'a [Point2]) -> Self {
        Self {
            points,
            area: geometry::polygon_area(points),
            perimeter: geometry::perimeter(points),
            circularity: geometry::circularity(points),
        }
    }

    pub fn enclosing_circle(&self) -> Option<Circle> {
        geometry::min_enclosing_circle(self.points)
    }

    pub fn centroid(&self) -> Option<Point2> {
        geometry::centroid(self.points)
    }

    /// Vertex count after polygon approximation
    pub fn approx_vertices(&self, epsilon_fraction: f64) -> usize {
        geometry::approx_polygon(self.points, epsilon_fraction * self.perimeter).len()
    }
}
