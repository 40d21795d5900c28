//! Drawing units and their millimeter multipliers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit declared by a drawing's `$INSUNITS` header variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawingUnit {
    Unitless,
    Inches,
    Feet,
    Millimeters,
    Centimeters,
    Meters,
    /// A code outside the supported set; treated as millimeters
    Unrecognized(i32),
}

impl DrawingUnit {
    /// Map an `$INSUNITS` code. Unknown codes fall back to a 1.0 multiplier.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => DrawingUnit::Unitless,
            1 => DrawingUnit::Inches,
            2 => DrawingUnit::Feet,
            4 => DrawingUnit::Millimeters,
            5 => DrawingUnit::Centimeters,
            6 => DrawingUnit::Meters,
            other => DrawingUnit::Unrecognized(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            DrawingUnit::Unitless => 0,
            DrawingUnit::Inches => 1,
            DrawingUnit::Feet => 2,
            DrawingUnit::Millimeters => 4,
            DrawingUnit::Centimeters => 5,
            DrawingUnit::Meters => 6,
            DrawingUnit::Unrecognized(code) => *code,
        }
    }

    /// Millimeters per drawing unit
    pub fn to_mm(&self) -> f64 {
        match self {
            DrawingUnit::Unitless => 1.0,
            DrawingUnit::Inches => 25.4,
            DrawingUnit::Feet => 304.8,
            DrawingUnit::Millimeters => 1.0,
            DrawingUnit::Centimeters => 10.0,
            DrawingUnit::Meters => 1000.0,
            DrawingUnit::Unrecognized(_) => 1.0,
        }
    }
}

impl Default for DrawingUnit {
    fn default() -> Self {
        DrawingUnit::Unitless
    }
}

impl fmt::Display for DrawingUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawingUnit::Unitless => write!(f, "unitless"),
            DrawingUnit::Inches => write!(f, "in"),
            DrawingUnit::Feet => write!(f, "ft"),
            DrawingUnit::Millimeters => write!(f, "mm"),
            DrawingUnit::Centimeters => write!(f, "cm"),
            DrawingUnit::Meters => write!(f, "m"),
            DrawingUnit::Unrecognized(code) => write!(f, "unrecognized({})", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_multipliers() {
        assert_eq!(DrawingUnit::from_code(0).to_mm(), 1.0);
        assert_eq!(DrawingUnit::from_code(1).to_mm(), 25.4);
        assert_eq!(DrawingUnit::from_code(2).to_mm(), 304.8);
        assert_eq!(DrawingUnit::from_code(4).to_mm(), 1.0);
        assert_eq!(DrawingUnit::from_code(5).to_mm(), 10.0);
        assert_eq!(DrawingUnit::from_code(6).to_mm(), 1000.0);
    }

    #[test]
    fn test_unknown_code_defaults_to_one() {
        let unit = DrawingUnit::from_code(14);
        assert_eq!(unit, DrawingUnit::Unrecognized(14));
        assert_eq!(unit.to_mm(), 1.0);
        assert_eq!(unit.code(), 14);
    }
}
