//! Complaint input files
//!
//! Accepted shapes: a JSON array of strings, a JSON array of objects (the
//! complaint is read from one column), or plain text with one complaint per line.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Read complaint texts from `path`
pub fn read_complaints(path: &Path, column: &str) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    parse_complaints(&raw, column)
}

/// Parse complaint texts from file contents
pub fn parse_complaints(raw: &str, column: &str) -> Result<Vec<String>> {
    if !raw.trim_start().starts_with('[') {
        return Ok(raw.lines().map(str::to_string).collect());
    }

    let entries: Vec<Value> = serde_json::from_str(raw).context("Input is not a valid JSON array")?;
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Object(object) => match object.get(column) {
                Some(value) => Ok(cell_text(value)),
                None => bail!("Row {} has no column \"{}\"", index, column),
            },
            other => Ok(cell_text(other)),
        })
        .collect()
}

/// Coerce a cell to text the way a spreadsheet export would
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
