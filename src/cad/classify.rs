//! Part classification from extracted CAD primitives
//!
//! Signatures are tried in order, first match wins:
//! 1. two or more circles and no closed loop: bearing / round washer
//! 2. a 4-vertex loop: square washer
//! 3. a 6-vertex loop: hex nut
//! 4. anything else with at least one circle: washer
//!
//! Every family needs a bore circle, so zero circles is a geometry error.

use crate::cad::{CadError, GeometricPrimitive};
use crate::core::geometry::{bounds, Circle, Point2};
use crate::entities::part::{Dimension, PartSpec, PartType};

fn loop_with_vertices<'a>(loops: &[(&'a [Point2], bool)], count: usize) -> Option<&'a [Point2]> {
    loops
        .iter()
        .find(|(points, _)| points.len() == count)
        .map(|(points, _)| *points)
}

/// Classify a drawing's primitives into a [`PartSpec`]
pub fn classify(primitives: &[GeometricPrimitive]) -> Result<PartSpec, CadError> {
    let circles: Vec<&Circle> = primitives
        .iter()
        .filter_map(|p| match p {
            GeometricPrimitive::Circle(c) => Some(c),
            _ => None,
        })
        .collect();

    let loops: Vec<(&[Point2], bool)> = primitives
        .iter()
        .filter_map(|p| match p {
            GeometricPrimitive::PointLoop { points, closed } => Some((points.as_slice(), *closed)),
            _ => None,
        })
        .collect();

    let smallest = circles
        .iter()
        .min_by(|a, b| a.radius.total_cmp(&b.radius))
        .ok_or_else(|| {
            CadError::Geometry("no CIRCLE entity found; every part type needs a bore".to_string())
        })?;
    let largest = circles
        .iter()
        .max_by(|a, b| a.radius.total_cmp(&b.radius))
        .unwrap_or(smallest);

    let has_closed_loop = loops.iter().any(|(_, closed)| *closed);

    let spec = if circles.len() >= 2 && !has_closed_loop {
        PartSpec::new(
            PartType::Bearing,
            [
                (Dimension::OuterDiameter, largest.diameter()),
                (Dimension::InnerDiameter, smallest.diameter()),
            ],
        )
    } else if let Some(square) = loop_with_vertices(&loops, 4) {
        let b = bounds(square)
            .ok_or_else(|| CadError::Geometry("empty square outline".to_string()))?;
        PartSpec::new(
            PartType::SquareWasher,
            [
                (Dimension::OuterWidth, b.width()),
                (Dimension::OuterHeight, b.height()),
                (Dimension::InnerDiameter, smallest.diameter()),
            ],
        )
    } else if let Some(hex) = loop_with_vertices(&loops, 6) {
        let b = bounds(hex).ok_or_else(|| CadError::Geometry("empty hex outline".to_string()))?;
        PartSpec::new(
            PartType::HexNut,
            [
                (Dimension::AcrossFlats, b.width()),
                (Dimension::InnerDiameter, smallest.diameter()),
            ],
        )
    } else {
        let mut dims = vec![(Dimension::OuterDiameter, largest.diameter())];
        if circles.len() >= 2 && smallest.radius < largest.radius {
            dims.push((Dimension::InnerDiameter, smallest.diameter()));
        }
        PartSpec::new(PartType::Washer, dims)
    };

    spec.ok_or_else(|| CadError::Geometry("classification produced no dimensions".to_string()))
}
