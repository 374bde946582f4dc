use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde_json::Value;

use crate::error::{PersistenceError, Result};
use crate::exclusion::ExclusionPolicy;
use crate::models::{Level, NgramSize, NgramTable, PersistenceTag, Row, TaggedTable};

/// Load a granularity table from a JSON file
///
/// Persistence columns left over from an earlier run are dropped.
pub fn load_table(path: &Path, size: NgramSize) -> Result<NgramTable> {
    load_tagged_table(path, size).map(|tagged| tagged.table)
}

/// Load a previously tagged table from a JSON file
pub fn load_tagged_table(path: &Path, size: NgramSize) -> Result<TaggedTable> {
    let content = read_file(path)?;
    parse_tagged_table_json(&content, size)
}

/// Parse a granularity table from a JSON string
pub fn parse_table_json(json: &str, size: NgramSize) -> Result<NgramTable> {
    parse_tagged_table_json(json, size).map(|tagged| tagged.table)
}

/// Parse a tagged table from a JSON string
///
/// Accepts a bare array of rows or a document with a `rows` array. Each
/// `persistence_<level>` key is lifted into a typed tag column before the row
/// itself is decoded; a level gets a column when any row carries its key.
pub fn parse_tagged_table_json(json: &str, size: NgramSize) -> Result<TaggedTable> {
    let document: Value = serde_json::from_str(json)
        .map_err(|e| PersistenceError::json(format!("parsing {} table", size), e))?;

    // Bare array or document with rows
    let raw_rows = match document {
        Value::Array(rows) => rows,
        Value::Object(mut object) => match object.remove("rows") {
            Some(Value::Array(rows)) => rows,
            _ => {
                return Err(PersistenceError::data(format!(
                    "{} table document has no rows array",
                    size
                )));
            }
        },
        _ => {
            return Err(PersistenceError::data(format!(
                "{} table must be an array of rows or a document with rows",
                size
            )));
        }
    };

    let row_count = raw_rows.len();
    let mut rows = Vec::with_capacity(row_count);
    let mut tags: BTreeMap<Level, Vec<Option<PersistenceTag>>> = BTreeMap::new();

    for (position, raw) in raw_rows.into_iter().enumerate() {
        let Value::Object(mut fields) = raw else {
            return Err(PersistenceError::data(format!(
                "{} row {}: expected an object",
                size, position
            )));
        };

        // Lift tag columns out before decoding the row
        for level in Level::ALL {
            let Some(cell) = fields.remove(&level.tag_column()) else {
                continue;
            };
            let tag = parse_tag_cell(&cell).map_err(|message| {
                PersistenceError::data(format!("{} row {}: {}", size, position, message))
            })?;
            tags.entry(level).or_insert_with(|| vec![None; row_count])[position] = tag;
        }

        // Unknown columns land in `extra`
        let row: Row = serde_json::from_value(Value::Object(fields)).map_err(|e| {
            PersistenceError::data(format!("{} row {}: {}", size, position, e))
        })?;
        rows.push(row);
    }

    Ok(TaggedTable {
        table: NgramTable::new(size, rows),
        tags,
    })
}

fn parse_tag_cell(cell: &Value) -> std::result::Result<Option<PersistenceTag>, String> {
    match cell {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.parse::<PersistenceTag>().map(Some),
        other => Err(format!("persistence tag must be a string, got {other}")),
    }
}

/// Load a stopword list: one value per line
pub fn load_stopwords(path: &Path) -> Result<HashSet<String>> {
    let content = read_file(path)?;
    Ok(parse_stopwords(&content))
}

/// Blank lines and lines starting with `#` are ignored
pub fn parse_stopwords(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Load an exclusion policy from a JSON file
pub fn load_exclusion_policy(path: &Path) -> Result<ExclusionPolicy> {
    let content = read_file(path)?;
    serde_json::from_str(&content)
        .map_err(|e| PersistenceError::json(format!("parsing exclusion policy {:?}", path), e))
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| PersistenceError::io(format!("reading {:?}", path), e))
}
