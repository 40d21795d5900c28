//! Core module - calibration, configuration, geometry and units

pub mod calibration;
pub mod config;
pub mod geometry;
pub mod units;

pub use calibration::{CalibrationAnchor, CalibrationError, CalibrationState};
pub use config::{Config, ConfigError};
pub use units::DrawingUnit;
