//! CAD geometry extraction
//!
//! Reads a 2D drawing, resolves its unit to millimeters, and reduces the
//! entity stream to circles and point loops. Coordinates are scaled at
//! extraction time; nothing downstream sees drawing units.

pub mod classify;
pub mod dxf;

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::geometry::{Circle, Point2};
use crate::core::units::DrawingUnit;
use crate::entities::part::PartSpec;

pub use classify::classify;
pub use dxf::{DxfDocument, DxfEntity, DxfSyntaxError};

/// Endpoint tolerance when chaining LINE segments, millimeters
const JOIN_TOLERANCE_MM: f64 = 1e-4;

#[derive(Debug, Error, Diagnostic)]
pub enum CadError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] DxfSyntaxError),

    #[error("CAD parse error: {0}")]
    #[diagnostic(code(dimspect::cad::parse))]
    Parse(String),

    #[error("CAD geometry error: {0}")]
    #[diagnostic(
        code(dimspect::cad::geometry),
        help("Supported parts: bearing/washer (circles), square washer (4-vertex outline + bore), hex nut (6-vertex outline + bore)")
    )]
    Geometry(String),

    #[error("Unsupported CAD format: {0}")]
    #[diagnostic(
        code(dimspect::cad::format),
        help("Usage: dimspect extract <file.dxf>")
    )]
    UnsupportedFormat(String),

    #[error("Cannot read {path}: {source}")]
    #[diagnostic(code(dimspect::cad::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Geometry extracted from a drawing, in millimeters
#[derive(Debug, Clone, PartialEq)]
pub enum GeometricPrimitive {
    Circle(Circle),
    PointLoop { points: Vec<Point2>, closed: bool },
}

/// CAD file formats recognised by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadFormat {
    Dxf,
    /// Recognised but not extracted
    Stl,
}

impl CadFormat {
    pub fn from_path(path: &Path) -> Result<Self, CadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("dxf") => Ok(CadFormat::Dxf),
            Some("stl") => Ok(CadFormat::Stl),
            Some(other) => Err(CadError::UnsupportedFormat(format!(
                ".{} (only DXF and STL are recognised)",
                other
            ))),
            None => Err(CadError::UnsupportedFormat(format!(
                "'{}' has no file extension",
                path.display()
            ))),
        }
    }
}

/// A parsed drawing: active unit plus millimeter primitives
#[derive(Debug, Clone, PartialEq)]
pub struct CadDrawing {
    pub unit: DrawingUnit,
    pub primitives: Vec<GeometricPrimitive>,
}

impl CadDrawing {
    /// Parse DXF text
    pub fn from_dxf(source: &str, name: &str) -> Result<Self, CadError> {
        let doc = DxfDocument::parse_named(source, name)?;
        Self::from_document(&doc)
    }

    /// Extract primitives from a parsed document
    pub fn from_document(doc: &DxfDocument) -> Result<Self, CadError> {
        let k = doc.unit.to_mm();
        let mut primitives = Vec::new();
        let mut segments: Vec<(Point2, Point2)> = Vec::new();

        for entity in &doc.entities {
            match entity.kind.as_str() {
                "CIRCLE" => {
                    let radius = entity
                        .number(40)
                        .ok_or_else(|| CadError::Parse("CIRCLE without radius (group 40)".into()))?
                        .map_err(CadError::Parse)?;
                    if radius <= 0.0 {
                        return Err(CadError::Parse(format!(
                            "CIRCLE radius must be positive, found {}",
                            radius
                        )));
                    }
                    let center = point(entity, 10, 20)?;
                    primitives.push(GeometricPrimitive::Circle(Circle::new(
                        center * k,
                        radius * k,
                    )));
                }
                "LINE" => {
                    let a = point(entity, 10, 20)? * k;
                    let b = point(entity, 11, 21)? * k;
                    segments.push((a, b));
                }
                "LWPOLYLINE" | "POLYLINE" => {
                    let xs = entity.numbers(10).map_err(CadError::Parse)?;
                    let ys = entity.numbers(20).map_err(CadError::Parse)?;
                    if xs.len() != ys.len() {
                        return Err(CadError::Parse(format!(
                            "{} has {} x values but {} y values",
                            entity.kind,
                            xs.len(),
                            ys.len()
                        )));
                    }
                    let mut points: Vec<Point2> = xs
                        .into_iter()
                        .zip(ys)
                        .map(|(x, y)| Point2::new(x * k, y * k))
                        .collect();
                    let mut closed = entity.flags() & 1 == 1;
                    if points.len() > 2
                        && points[0].distance(points[points.len() - 1]) < JOIN_TOLERANCE_MM
                    {
                        points.pop();
                        closed = true;
                    }
                    if !points.is_empty() {
                        primitives.push(GeometricPrimitive::PointLoop { points, closed });
                    }
                }
                other => {
                    tracing::debug!(entity = other, "skipping unsupported DXF entity");
                }
            }
        }

        primitives.extend(chain_segments(segments));

        if primitives.is_empty() {
            return Err(CadError::Parse(
                "no CIRCLE, LINE, LWPOLYLINE or POLYLINE entities found".to_string(),
            ));
        }

        Ok(Self {
            unit: doc.unit,
            primitives,
        })
    }

    /// Classify the drawing into a part spec
    pub fn classify(&self) -> Result<PartSpec, CadError> {
        classify(&self.primitives)
    }

    pub fn circle_count(&self) -> usize {
        self.primitives
            .iter()
            .filter(|p| matches!(p, GeometricPrimitive::Circle(_)))
            .count()
    }

    pub fn loop_count(&self) -> usize {
        self.primitives.len() - self.circle_count()
    }
}

fn point(entity: &DxfEntity, x_code: i32, y_code: i32) -> Result<Point2, CadError> {
    let x = entity.number(x_code).transpose().map_err(CadError::Parse)?.unwrap_or(0.0);
    let y = entity.number(y_code).transpose().map_err(CadError::Parse)?.unwrap_or(0.0);
    Ok(Point2::new(x, y))
}

fn drop_collinear(points: Vec<Point2>) -> Vec<Point2> {
    if points.len() <= 3 {
        return points;
    }
    let n = points.len();
    points
        .iter()
        .enumerate()
        .filter(|(i, p)| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            let cross = (**p - prev).perp_dot(next - **p);
            cross.abs() > JOIN_TOLERANCE_MM * JOIN_TOLERANCE_MM
        })
        .map(|(_, p)| *p)
        .collect()
}

/// Join LINE segments that share endpoints into point loops
fn chain_segments(mut segments: Vec<(Point2, Point2)>) -> Vec<GeometricPrimitive> {
    let near = |a: &Point2, b: &Point2| a.distance(*b) < JOIN_TOLERANCE_MM;
    let mut loops = Vec::new();

    while let Some((start, end)) = segments.pop() {
        let mut chain = vec![start, end];

        loop {
            let tail = chain[chain.len() - 1];
            let Some(idx) = segments
                .iter()
                .position(|(a, b)| near(a, &tail) || near(b, &tail))
            else {
                break;
            };
            let (a, b) = segments.swap_remove(idx);
            chain.push(if near(&a, &tail) { b } else { a });
            if near(&chain[0], &chain[chain.len() - 1]) {
                break;
            }
        }

        let closed = chain.len() > 3 && near(&chain[0], &chain[chain.len() - 1]);
        if closed {
            chain.pop();
            chain = drop_collinear(chain);
        }
        loops.push(GeometricPrimitive::PointLoop {
            points: chain,
            closed,
        });
    }

    loops
}

/// Parse a CAD file into its drawing, dispatching on the file extension
pub fn read_drawing(path: &Path) -> Result<CadDrawing, CadError> {
    match CadFormat::from_path(path)? {
        CadFormat::Dxf => {
            let bytes = std::fs::read(path).map_err(|source| CadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let text = String::from_utf8_lossy(&bytes);
            CadDrawing::from_dxf(&text, &path.display().to_string())
        }
        CadFormat::Stl => Err(CadError::UnsupportedFormat(
            "STL meshes are recognised but dimension extraction supports 2D DXF only".to_string(),
        )),
    }
}

/// Parse and classify a CAD file
pub fn parse_cad(path: &Path) -> Result<PartSpec, CadError> {
    read_drawing(path)?.classify()
}
