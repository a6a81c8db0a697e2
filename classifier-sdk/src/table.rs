//! Result table handed to the export layer
//!
//! A minimal column-oriented view of the input: the complaint column plus
//! the two appended classification columns, in input order.

use serde_json::{Map, Value};

use crate::error::{ClassifierError, Result};
use crate::model::ClassificationResult;
use crate::taxonomy::Sentinel;

/// Name of the appended category column
pub const CATEGORY_COLUMN: &str = "Clasificacion";

/// Name of the appended justification column
pub const REASON_COLUMN: &str = "Razon";

/// Rows of named string cells
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResultTable {
    /// One-column table holding the complaint texts
    pub fn from_texts<I, T>(column: &str, texts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            columns: vec![column.to_string()],
            rows: texts.into_iter().map(|text| vec![text.into()]).collect(),
        }
    }

    /// Column names, in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `row` in the named column
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let position = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(position).map(String::as_str)
    }

    /// Append the category and reason columns
    pub fn append_classification(&mut self, results: Vec<ClassificationResult>) -> Result<()> {
        if results.len() != self.rows.len() {
            return Err(ClassifierError::configuration(format!(
                "Expected {} results, got {}",
                self.rows.len(),
                results.len()
            )));
        }

        self.columns.push(CATEGORY_COLUMN.to_string());
        self.columns.push(REASON_COLUMN.to_string());
        for (row, result) in self.rows.iter_mut().zip(results) {
            row.push(result.category);
            row.push(result.reason);
        }
        Ok(())
    }

    /// Indexes of rows whose category is an error sentinel
    pub fn failed_rows(&self) -> Vec<usize> {
        let position = match self.columns.iter().position(|c| c == CATEGORY_COLUMN) {
            Some(position) => position,
            None => return Vec::new(),
        };

        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                Sentinel::parse(&row[position])
                    .map(|sentinel| sentinel.is_error())
                    .unwrap_or(false)
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let record: Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned().map(Value::String))
                    .collect();
                Value::Object(record)
            })
            .collect()
    }
}
