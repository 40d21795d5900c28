//! Part entity - part-type classification and the nominal dimension table
//!
//! A [`PartSpec`] is the CAD-derived ground truth for one inspection session:
//! the part family plus its nominal dimensions in millimeters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Supported part families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartType {
    /// Ball bearing (two concentric circles)
    Bearing,
    /// Round washer
    Washer,
    /// Square washer with a round bore
    SquareWasher,
    /// Hexagonal nut
    HexNut,
}

impl PartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartType::Bearing => "bearing",
            PartType::Washer => "washer",
            PartType::SquareWasher => "square_washer",
            PartType::HexNut => "hex_nut",
        }
    }

    /// Human label used on the live-status sidecar
    pub fn label(&self) -> &'static str {
        match self {
            PartType::Bearing => "BEARING",
            PartType::Washer => "WASHER",
            PartType::SquareWasher => "SQUARE WASHER",
            PartType::HexNut => "HEX NUT",
        }
    }

    /// Dimensions a detector for this part family can report
    pub fn dimensions(&self) -> &'static [Dimension] {
        match self {
            PartType::Bearing | PartType::Washer => {
                &[Dimension::OuterDiameter, Dimension::InnerDiameter]
            }
            PartType::SquareWasher => &[
                Dimension::OuterWidth,
                Dimension::OuterHeight,
                Dimension::InnerDiameter,
            ],
            PartType::HexNut => &[Dimension::AcrossFlats, Dimension::InnerDiameter],
        }
    }

    pub fn all() -> &'static [PartType] {
        &[
            PartType::Bearing,
            PartType::Washer,
            PartType::SquareWasher,
            PartType::HexNut,
        ]
    }
}

impl fmt::Display for PartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PartType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "bearing" | "ball_bearing" => Ok(PartType::Bearing),
            "washer" | "round_washer" => Ok(PartType::Washer),
            "square_washer" => Ok(PartType::SquareWasher),
            "hex_nut" | "nut" => Ok(PartType::HexNut),
            _ => Err(format!("Unknown part type: {}", s)),
        }
    }
}

/// The fixed dimension vocabulary
///
/// Ordering follows the report column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    OuterDiameter,
    InnerDiameter,
    OuterWidth,
    OuterHeight,
    AcrossFlats,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::OuterDiameter => "outer_diameter",
            Dimension::InnerDiameter => "inner_diameter",
            Dimension::OuterWidth => "outer_width",
            Dimension::OuterHeight => "outer_height",
            Dimension::AcrossFlats => "across_flats",
        }
    }

    /// Upper-case label for human readouts
    pub fn label(&self) -> &'static str {
        match self {
            Dimension::OuterDiameter => "OUTER DIAMETER",
            Dimension::InnerDiameter => "INNER DIAMETER",
            Dimension::OuterWidth => "OUTER WIDTH",
            Dimension::OuterHeight => "OUTER HEIGHT",
            Dimension::AcrossFlats => "ACROSS FLATS",
        }
    }

    pub fn all() -> &'static [Dimension] {
        &[
            Dimension::OuterDiameter,
            Dimension::InnerDiameter,
            Dimension::OuterWidth,
            Dimension::OuterHeight,
            Dimension::AcrossFlats,
        ]
    }

    /// Resolve a column or table name against the vocabulary.
    ///
    /// The name is lower-cased and a trailing `_mm` unit suffix stripped. An
    /// exact vocabulary match wins; otherwise the name must start with a
    /// vocabulary entry followed by `_` (so `outer_diameter_avg` resolves but
    /// `outer_width` never resolves to something it merely contains).
    pub fn match_name(name: &str) -> Option<Dimension> {
        let lowered = name.trim().to_lowercase();
        let key = lowered.strip_suffix("_mm").unwrap_or(&lowered);

        if let Some(exact) = Self::all().iter().find(|d| d.as_str() == key) {
            return Some(*exact);
        }

        Self::all()
            .iter()
            .filter(|d| {
                key.strip_prefix(d.as_str())
                    .is_some_and(|rest| rest.starts_with('_'))
            })
            .max_by_key(|d| d.as_str().len())
            .copied()
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|d| d.as_str() == s.trim().to_lowercase())
            .copied()
            .ok_or_else(|| format!("Unknown dimension: {}", s))
    }
}

/// Part type plus nominal dimensions (millimeters)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartSpec {
    pub part_type: PartType,

    pub dimensions: BTreeMap<Dimension, f64>,
}

impl PartSpec {
    /// Create a spec; `None` if no dimension is given
    pub fn new(
        part_type: PartType,
        dimensions: impl IntoIterator<Item = (Dimension, f64)>,
    ) -> Option<Self> {
        let dimensions: BTreeMap<_, _> = dimensions.into_iter().collect();
        if dimensions.is_empty() {
            return None;
        }
        Some(Self {
            part_type,
            dimensions,
        })
    }

    /// Rebuild a spec from a nominal table, inferring the part type from
    /// which dimension names are present.
    pub fn from_nominal(dimensions: BTreeMap<Dimension, f64>) -> Option<Self> {
        let has = |d: Dimension| dimensions.contains_key(&d);

        let part_type = if has(Dimension::OuterDiameter) && has(Dimension::InnerDiameter) {
            PartType::Bearing
        } else if has(Dimension::OuterWidth) && has(Dimension::InnerDiameter) {
            PartType::SquareWasher
        } else if has(Dimension::AcrossFlats) {
            PartType::HexNut
        } else {
            PartType::Washer
        };

        Self::new(part_type, dimensions)
    }

    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        self.dimensions.get(&dimension).copied()
    }

    /// Pair a measured column name with one of this spec's nominal dimensions.
    ///
    /// The name resolves through [`Dimension::match_name`] (exact, or a
    /// vocabulary prefix followed by `_`) and must name a dimension this spec
    /// carries.
    pub fn match_dimension(&self, name: &str) -> Option<Dimension> {
        Dimension::match_name(name).filter(|d| self.dimensions.contains_key(d))
    }

    /// Override the inferred part type (e.g. a round washer whose nominal
    /// table is indistinguishable from a bearing's)
    pub fn with_part_type(mut self, part_type: PartType) -> Self {
        self.part_type = part_type;
        self
    }
}
