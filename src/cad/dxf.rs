//! ASCII DXF reader
//!
//! A DXF file is a flat sequence of `(group code, value)` line pairs. Entities
//! start at a `0` code naming their type; every pair up to the next `0` code
//! belongs to that entity. Repeated codes (polyline vertex coordinates) keep
//! their encounter order.

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::units::DrawingUnit;

/// Syntax error with source location
#[derive(Debug, Error, Diagnostic)]
#[error("DXF syntax error: {message}")]
#[diagnostic(code(dimspect::cad::syntax))]
pub struct DxfSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    message: String,
}

impl DxfSyntaxError {
    fn at_line(lines: &[Line<'_>], index: usize, source: &str, name: &str, message: String) -> Self {
        let (offset, len) = lines
            .get(index)
            .map(|l| (l.offset, l.text.len().max(1)))
            .unwrap_or((source.len().saturating_sub(1), 1));

        Self {
            src: NamedSource::new(name, source.to_string()),
            span: SourceSpan::from(offset..offset + len),
            help: Some("Group codes must be integers on their own line, each followed by a value line".to_string()),
            message,
        }
    }
}

/// One `0`-delimited entity with its attributes keyed by group code
#[derive(Debug, Clone, PartialEq)]
pub struct DxfEntity {
    pub kind: String,
    pub fields: BTreeMap<i32, Vec<String>>,
}

impl DxfEntity {
    fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_uppercase(),
            fields: BTreeMap::new(),
        }
    }

    /// All values recorded for a group code, in encounter order
    pub fn values(&self, code: i32) -> &[String] {
        self.fields.get(&code).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value for a code parsed as a number
    pub fn number(&self, code: i32) -> Option<Result<f64, String>> {
        self.values(code).first().map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| format!("{} group {} is not a number: '{}'", self.kind, code, v))
        })
    }

    /// All values for a code parsed as numbers
    pub fn numbers(&self, code: i32) -> Result<Vec<f64>, String> {
        self.values(code)
            .iter()
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|_| format!("{} group {} is not a number: '{}'", self.kind, code, v))
            })
            .collect()
    }

    /// Integer flags (group 70), zero when absent
    pub fn flags(&self) -> i32 {
        self.values(70)
            .first()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// Parsed drawing: active unit plus the ENTITIES section
#[derive(Debug, Clone, PartialEq)]
pub struct DxfDocument {
    pub unit: DrawingUnit,
    pub entities: Vec<DxfEntity>,
}

struct Line<'a> {
    text: &'a str,
    offset: usize,
}

fn split_lines(source: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in source.split_inclusive('\n') {
        lines.push(Line {
            text: raw.trim_end_matches(['\r', '\n']),
            offset,
        });
        offset += raw.len();
    }
    lines
}

impl DxfDocument {
    pub fn parse(source: &str) -> Result<Self, DxfSyntaxError> {
        Self::parse_named(source, "<dxf>")
    }

    /// Parse with a file name for diagnostics
    pub fn parse_named(source: &str, name: &str) -> Result<Self, DxfSyntaxError> {
        let lines = split_lines(source);

        let mut pairs: Vec<(i32, &str)> = Vec::with_capacity(lines.len() / 2);
        let mut i = 0;
        while i + 1 < lines.len() {
            let code_text = lines[i].text.trim();
            let code = code_text.parse::<i32>().map_err(|_| {
                DxfSyntaxError::at_line(
                    &lines,
                    i,
                    source,
                    name,
                    format!("expected group code, found '{}'", code_text),
                )
            })?;
            pairs.push((code, lines[i + 1].text.trim()));
            i += 2;
        }

        let unit = Self::read_units(&pairs);
        let entities = Self::read_entities(&pairs);

        Ok(Self { unit, entities })
    }

    fn read_units(pairs: &[(i32, &str)]) -> DrawingUnit {
        pairs
            .iter()
            .position(|(code, value)| *code == 9 && *value == "$INSUNITS")
            .and_then(|idx| pairs.get(idx + 1))
            .and_then(|(_, value)| value.parse::<i32>().ok())
            .map(DrawingUnit::from_code)
            .unwrap_or_default()
    }

    fn read_entities(pairs: &[(i32, &str)]) -> Vec<DxfEntity> {
        let mut entities: Vec<DxfEntity> = Vec::new();
        let mut section: Option<&str> = None;
        let mut current: Option<DxfEntity> = None;
        // Old-style POLYLINE collects the VERTEX entities that follow it
        let mut open_polyline: Option<DxfEntity> = None;

        let mut i = 0;
        while i < pairs.len() {
            let (code, value) = pairs[i];

            if code == 0 {
                if let Some(entity) = current.take() {
                    Self::finish_entity(entity, &mut entities, &mut open_polyline);
                }

                match value {
                    "SECTION" => {
                        section = pairs.get(i + 1).filter(|(c, _)| *c == 2).map(|(_, v)| *v);
                        i += 2;
                        continue;
                    }
                    "ENDSEC" => {
                        if let Some(poly) = open_polyline.take() {
                            entities.push(poly);
                        }
                        section = None;
                    }
                    "EOF" => break,
                    kind if section == Some("ENTITIES") => {
                        current = Some(DxfEntity::new(kind));
                    }
                    _ => {}
                }
            } else if let Some(entity) = current.as_mut() {
                entity
                    .fields
                    .entry(code)
                    .or_default()
                    .push(value.to_string());
            }

            i += 1;
        }

        if let Some(entity) = current.take() {
            Self::finish_entity(entity, &mut entities, &mut open_polyline);
        }
        if let Some(poly) = open_polyline.take() {
            entities.push(poly);
        }

        entities
    }

    fn finish_entity(
        entity: DxfEntity,
        entities: &mut Vec<DxfEntity>,
        open_polyline: &mut Option<DxfEntity>,
    ) {
        match entity.kind.as_str() {
            "POLYLINE" => {
                if let Some(previous) = open_polyline.replace(entity) {
                    entities.push(previous);
                }
            }
            "VERTEX" => {
                if let Some(poly) = open_polyline.as_mut() {
                    for code in [10, 20] {
                        if let Some(v) = entity.values(code).first() {
                            poly.fields.entry(code).or_default().push(v.clone());
                        }
                    }
                }
            }
            "SEQEND" => {
                if let Some(poly) = open_polyline.take() {
                    entities.push(poly);
                }
            }
            _ => entities.push(entity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dxf(body: &[(&str, &str)]) -> String {
        body.iter()
            .map(|(c, v)| format!("{}\n{}\n", c, v))
            .collect()
    }

    #[test]
    fn test_reads_units_and_entities() {
        let src = dxf(&[
            ("0", "SECTION"),
            ("2", "HEADER"),
            ("9", "$INSUNITS"),
            ("70", "1"),
            ("0", "ENDSEC"),
            ("0", "SECTION"),
            ("2", "ENTITIES"),
            ("0", "CIRCLE"),
            ("10", "0.0"),
            ("20", "0.0"),
            ("40", "0.5"),
            ("0", "ENDSEC"),
            ("0", "EOF"),
        ]);

        let doc = DxfDocument::parse(&src).unwrap();
        assert_eq!(doc.unit, DrawingUnit::Inches);
        assert_eq!(doc.entities.len(), 1);
        assert_eq!(doc.entities[0].kind, "CIRCLE");
        assert_eq!(doc.entities[0].number(40).unwrap().unwrap(), 0.5);
    }

    #[test]
    fn test_missing_units_default_to_unitless() {
        let src = dxf(&[
            ("0", "SECTION"),
            ("2", "ENTITIES"),
            ("0", "LINE"),
            ("10", "0"),
            ("20", "0"),
            ("11", "1"),
            ("21", "0"),
            ("0", "ENDSEC"),
        ]);
        let doc = DxfDocument::parse(&src).unwrap();
        assert_eq!(doc.unit, DrawingUnit::Unitless);
        assert_eq!(doc.entities.len(), 1);
    }

    #[test]
    fn test_repeated_codes_keep_order() {
        let src = dxf(&[
            ("0", "SECTION"),
            ("2", "ENTITIES"),
            ("0", "LWPOLYLINE"),
            ("90", "3"),
            ("70", "1"),
            ("10", "1"),
            ("20", "2"),
            ("10", "3"),
            ("20", "4"),
            ("10", "5"),
            ("20", "6"),
            ("0", "ENDSEC"),
        ]);
        let doc = DxfDocument::parse(&src).unwrap();
        let poly = &doc.entities[0];
        assert_eq!(poly.numbers(10).unwrap(), vec![1.0, 3.0, 5.0]);
        assert_eq!(poly.numbers(20).unwrap(), vec![2.0, 4.0, 6.0]);
        assert_eq!(poly.flags(), 1);
    }

    #[test]
    fn test_old_style_polyline_gathers_vertices() {
        let src = dxf(&[
            ("0", "SECTION"),
            ("2", "ENTITIES"),
            ("0", "POLYLINE"),
            ("70", "1"),
            ("0", "VERTEX"),
            ("10", "0"),
            ("20", "0"),
            ("0", "VERTEX"),
            ("10", "4"),
            ("20", "0"),
            ("0", "VERTEX"),
            ("10", "4"),
            ("20", "4"),
            ("0", "SEQEND"),
            ("0", "CIRCLE"),
            ("10", "2"),
            ("20", "2"),
            ("40", "1"),
            ("0", "ENDSEC"),
        ]);
        let doc = DxfDocument::parse(&src).unwrap();
        assert_eq!(doc.entities.len(), 2);
        assert_eq!(doc.entities[0].kind, "POLYLINE");
        assert_eq!(doc.entities[0].numbers(10).unwrap(), vec![0.0, 4.0, 4.0]);
        assert_eq!(doc.entities[1].kind, "CIRCLE");
    }

    #[test]
    fn test_entities_outside_section_are_ignored() {
        let src = dxf(&[
            ("0", "SECTION"),
            ("2", "BLOCKS"),
            ("0", "CIRCLE"),
            ("40", "3"),
            ("0", "ENDSEC"),
        ]);
        let doc = DxfDocument::parse(&src).unwrap();
        assert!(doc.entities.is_empty());
    }

    #[test]
    fn test_bad_group_code_is_a_syntax_error() {
        let src = "0\nSECTION\nnot-a-code\nENTITIES\n";
        let err = DxfDocument::parse(src).unwrap_err();
        assert!(err.to_string().contains("not-a-code"));
    }
}
