//! Response parsing
//!
//! Single-item answers are free text with labelled lines; batch answers are
//! a JSON array that may be wrapped in commentary.

use serde_json::{Map, Value};

use crate::error::{ClassifierError, Result};
use crate::model::ClassificationResult;
use crate::taxonomy::{Sentinel, TAXONOMY};

const CATEGORY_LABELS: [&str; 2] = ["categoría", "categoria"];
const REASON_LABELS: [&str; 2] = ["razón", "razon"];

/// Fields pulled out of a single-item answer; missing lines are empty strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabeledFields {
    pub category: String,
    pub reason: String,
}

/// One entry of a batch answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// Position within the submitted chunk, when the entry carried a usable one
    pub id: Option<usize>,

    /// Classification, or an `ERROR_FORMATO` result for a malformed entry
    pub result: ClassificationResult,
}

impl BatchItem {
    fn malformed(id: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            id,
            result: ClassificationResult::sentinel(Sentinel::Format, message),
        }
    }
}

fn is_emphasis(c: char) -> bool {
    c.is_whitespace() || matches!(c, '*' | '_')
}

fn value_after_label(line: &str, labels: &[&str]) -> Option<String> {
    let (label, value) = line.split_once(':')?;
    let label = label.trim_matches(is_emphasis).to_lowercase();
    if !labels.contains(&label.as_str()) {
        return None;
    }
    Some(value.trim_matches(is_emphasis).to_string())
}

/// Extract `Categoría:` and `Razón:` values from a free-text answer.
///
/// Matching is case-insensitive and accepts the unaccented spellings.
/// Leading list markers and markdown emphasis are ignored.
pub fn parse_labeled(raw: &str) -> LabeledFields {
    let mut fields = LabeledFields::default();

    for line in raw.lines() {
        let line = line.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '-' | '#'));

        if let Some(category) = value_after_label(line, &CATEGORY_LABELS) {
            fields.category = category;
        } else if let Some(reason) = value_after_label(line, &REASON_LABELS) {
            fields.reason = reason;
        }
    }

    fields
}

/// The span from the first `[` to the last `]`
pub fn extract_json_array(raw: &str) -> Result<&str> {
    match (raw.find('['), raw.rfind(']')) {
        (Some(start), Some(end)) if start < end => Ok(&raw[start..=end]),
        _ => Err(ClassifierError::format("Response does not contain a JSON array")),
    }
}

fn parse_item(value: &Value) -> BatchItem {
    let object: &Map<String, Value> = match value.as_object() {
        Some(object) => object,
        None => return BatchItem::malformed(None, format!("Batch entry is not an object: {}", value)),
    };

    let id = match object.get("id") {
        Some(raw_id) => match raw_id.as_u64() {
            Some(id) => Some(id as usize),
            None => return BatchItem::malformed(None, format!("Batch entry id is not a non-negative integer: {}", raw_id)),
        },
        None => return BatchItem::malformed(None, "Batch entry is missing \"id\""),
    };

    let category = match object.get("categoria").and_then(Value::as_str) {
        Some(category) => category,
        None => return BatchItem::malformed(id, "Batch entry is missing \"categoria\""),
    };

    let reason = match object.get("razon").and_then(Value::as_str) {
        Some(reason) => reason.trim(),
        None => return BatchItem::malformed(id, "Batch entry is missing \"razon\""),
    };

    match TAXONOMY.resolve(category) {
        Some(label) => BatchItem {
            id,
            result: ClassificationResult::classified(label, reason),
        },
        None => BatchItem::malformed(id, format!("Category outside the taxonomy: {}", category)),
    }
}

/// Decode a batch answer into per-entry results.
///
/// A missing array is a format error and an undecodable one a JSON error;
/// either invalidates the whole batch. Malformed entries only affect themselves.
pub fn parse_batch(raw: &str) -> Result<Vec<BatchItem>> {
    let span = extract_json_array(raw)?;
    let decoded: Value = serde_json::from_str(span)?;

    match decoded {
        Value::Array(entries) => Ok(entries.iter().map(parse_item).collect()),
        other => Err(ClassifierError::format(format!("Expected a JSON array, got {}", other))),
    }
}
