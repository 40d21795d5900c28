//! Nominal-dimension table: `type,value_mm`, one row per dimension

use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use crate::entities::part::{Dimension, PartSpec};
use crate::store::{ensure_parent, get_field, header_map, parse_number, StoreError};

const VALUE_COLUMNS: [&str; 2] = ["value_mm", "diameter_mm"];

pub fn write_nominal(path: &Path, spec: &PartSpec) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .map_err(|e| StoreError::csv(path, e))?;

    wtr.write_record(["type", "value_mm"])
        .map_err(|e| StoreError::csv(path, e))?;
    for (dimension, value) in &spec.dimensions {
        wtr.write_record([dimension.as_str(), value.to_string().as_str()])
            .map_err(|e| StoreError::csv(path, e))?;
    }
    wtr.flush().map_err(|e| StoreError::io(path, e))
}

/// Read a nominal table back, inferring the part type from its dimensions.
///
/// Rows naming something outside the dimension vocabulary are skipped.
pub fn read_nominal(path: &Path) -> Result<PartSpec, StoreError> {
    let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);

    let headers = header_map(rdr.headers().map_err(|e| StoreError::csv(path, e))?);
    let missing = |column: &str| StoreError::MissingColumn {
        path: path.to_path_buf(),
        column: column.to_string(),
    };
    if !headers.contains_key("type") {
        return Err(missing("type"));
    }
    // older extractor output used `diameter_mm` for the value column
    let value_column = VALUE_COLUMNS
        .iter()
        .copied()
        .find(|c| headers.contains_key(*c))
        .ok_or_else(|| missing("value_mm"))?;

    let mut dimensions = BTreeMap::new();
    for (idx, result) in rdr.records().enumerate() {
        let row = idx + 2;
        let record = result.map_err(|e| StoreError::csv(path, e))?;

        let (Some(name), Some(raw)) = (
            get_field(&record, &headers, "type"),
            get_field(&record, &headers, value_column),
        ) else {
            continue;
        };
        let Some(dimension) = Dimension::match_name(name) else {
            tracing::warn!(row, name, "skipping unknown nominal dimension");
            continue;
        };
        let value = parse_number(path, row, value_column, raw)?;
        dimensions.entry(dimension).or_insert(value);
    }

    PartSpec::from_nominal(dimensions).ok_or_else(|| StoreError::Empty {
        path: path.to_path_buf(),
    })
}
