//! Entity type definitions
//!
//! - [`PartSpec`] - part type plus nominal dimensions from CAD
//! - [`Measurement`] - one converted detection
//! - [`ComparisonRecord`] / [`ComparisonReport`] - tolerance verdicts

pub mod comparison;
pub mod measurement;
pub mod part;

pub use comparison::{ComparisonRecord, ComparisonReport, Verdict};
pub use measurement::{Measurement, TypedMeasurement};
pub use part::{Dimension, PartSpec, PartType};
