//! Threshold parameters for the shape detectors
//!
//! Every heuristic threshold lives here as a named, documented default so it
//! can be tuned from the config file rather than edited in detector code.
//! Pixel-valued limits assume the reference camera setup (roughly 4 px/mm at
//! the working distance); ratios are scale-free.

use serde::{Deserialize, Serialize};

/// Bearing bore window, as a fraction of the outer radius. Real bearings sit
/// between ~0.35 (deep groove, small bore) and ~0.65 (thin section).
pub const BEARING_BORE_RATIO: (f64, f64) = (0.3, 0.7);

/// Contours rounder than this are treated as circle candidates for bearings.
pub const BEARING_MIN_CIRCULARITY: f64 = 0.8;

/// Washer bore window, as a fraction of the outer radius. Flat washers run
/// from heavy (small bore) to fender-style, so the window is wider than the
/// bearing one.
pub const WASHER_BORE_RATIO: (f64, f64) = (0.15, 0.6);

/// Threshold blobs smaller than this (px^2) are speckle, not a bore.
pub const WASHER_MIN_BORE_AREA_PX: f64 = 50.0;

/// Square washer outline must cover at least this share of the ROI area.
pub const SQUARE_MIN_AREA_FRACTION: f64 = 0.08;

/// A square scores ~0.785 circularity; above this the outline is round.
pub const SQUARE_MAX_CIRCULARITY: f64 = 0.92;

/// Width/height within this relative band are averaged into one side.
pub const SQUARE_SYMMETRY_TOLERANCE: f64 = 0.10;

/// Hex nut contour area window (px^2) at the reference standoff.
pub const HEX_AREA_PX: (f64, f64) = (1500.0, 20000.0);

/// Convex hexagon solidity is 1.0; threaded bores and chamfers keep real
/// nuts above this.
pub const HEX_MIN_SOLIDITY: f64 = 0.9;

/// Nominal bore-to-across-flats ratio for metric hex nuts.
pub const HEX_EXPECTED_BORE_RATIO: f64 = 0.55;

/// Douglas-Peucker tolerance as a fraction of contour perimeter.
pub const APPROX_EPSILON_FRACTION: f64 = 0.04;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BearingParams {
    /// Inner bore radius window relative to the outer radius
    pub bore_ratio: (f64, f64),
    /// Minimum circularity for a contour to count as a circle candidate
    pub min_circularity: f64,
    /// Physical outer diameter used to pick among candidates once calibrated
    pub expected_outer_mm: Option<f64>,
    /// Physical bore diameter used to pick among bore candidates once calibrated
    pub expected_inner_mm: Option<f64>,
}

impl Default for BearingParams {
    fn default() -> Self {
        Self {
            bore_ratio: BEARING_BORE_RATIO,
            min_circularity: BEARING_MIN_CIRCULARITY,
            expected_outer_mm: Some(31.0),
            expected_inner_mm: Some(14.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WasherParams {
    /// Bore radius window relative to the outer radius (exclusive bounds)
    pub bore_ratio: (f64, f64),
    /// Minimum blob area for threshold-fallback bore candidates
    pub min_bore_area_px: f64,
}

impl Default for WasherParams {
    fn default() -> Self {
        Self {
            bore_ratio: WASHER_BORE_RATIO,
            min_bore_area_px: WASHER_MIN_BORE_AREA_PX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquareWasherParams {
    pub min_area_fraction: f64,
    pub max_circularity: f64,
    pub approx_epsilon_fraction: f64,
    /// Polygon approximation vertex window; 4 is ideal, rounded corners add a few
    pub vertices: (usize, usize),
    pub min_side_px: f64,
    pub symmetry_tolerance: f64,
    /// Bore centre must be within this fraction of the short side from the outline centre
    pub bore_center_fraction: f64,
    /// Bore area over outline area must fall inside this window
    pub bore_area_ratio: (f64, f64),
    /// Bore-to-outline area ratio that earns the full size score
    pub bore_ideal_area_ratio: (f64, f64),
    /// Minimum combined score for a direct circle candidate
    pub circle_score_threshold: f64,
    /// Minimum circularity for a threshold-contour bore
    pub hole_min_circularity: f64,
    /// Minimum combined score for a threshold-contour bore
    pub contour_score_threshold: f64,
}

impl Default for SquareWasherParams {
    fn default() -> Self {
        Self {
            min_area_fraction: SQUARE_MIN_AREA_FRACTION,
            max_circularity: SQUARE_MAX_CIRCULARITY,
            approx_epsilon_fraction: APPROX_EPSILON_FRACTION,
            vertices: (4, 8),
            min_side_px: 5.0,
            symmetry_tolerance: SQUARE_SYMMETRY_TOLERANCE,
            bore_center_fraction: 0.25,
            bore_area_ratio: (0.04, 0.4),
            bore_ideal_area_ratio: (0.08, 0.25),
            circle_score_threshold: 0.6,
            hole_min_circularity: 0.75,
            contour_score_threshold: 0.65,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HexNutParams {
    pub area_px: (f64, f64),
    pub min_solidity: f64,
    pub approx_epsilon_fraction: f64,
    /// Vertex window around the ideal 6, tolerating one vertex of approximation noise
    pub vertices: (usize, usize),
    pub expected_bore_ratio: f64,
    /// Bore diameter window relative to across-flats (exclusive bounds)
    pub bore_ratio: (f64, f64),
    /// Bore centre offset limit as a fraction of across-flats
    pub concentricity_fraction: f64,
}

impl Default for HexNutParams {
    fn default() -> Self {
        Self {
            area_px: HEX_AREA_PX,
            min_solidity: HEX_MIN_SOLIDITY,
            approx_epsilon_fraction: APPROX_EPSILON_FRACTION,
            vertices: (5, 7),
            expected_bore_ratio: HEX_EXPECTED_BORE_RATIO,
            bore_ratio: (0.5, 0.9),
            concentricity_fraction: 0.1,
        }
    }
}

/// Parameter blocks for every detector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    pub bearing: BearingParams,
    pub washer: WasherParams,
    pub square_washer: SquareWasherParams,
    pub hex_nut: HexNutParams,
}
