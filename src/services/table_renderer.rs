// Fixed-width text table rendering for row sets
use crate::models::RowSet;
use serde_json::Value;

/// Characters reserved for each cell, not sized to content
pub const COLUMN_WIDTH: usize = 20;

/// Output for a row set without records
pub const NO_RESULTS: &str = "No results";

pub struct TableRenderer;

impl TableRenderer {
    /// Render a header line, a separator line and one line per record
    ///
    /// Every line ends with a newline. Cells are left-justified and padded to
    /// [`COLUMN_WIDTH`]; longer values are printed whole.
    pub fn render(row_set: &RowSet) -> String {
        if row_set.is_empty() {
            return NO_RESULTS.to_string();
        }

        let mut result = String::new();

        for header in &row_set.columns {
            result.push_str(&Self::cell(header));
        }
        result.push('\n');

        result.push_str(&"-".repeat((COLUMN_WIDTH + 1) * row_set.columns.len()));
        result.push('\n');

        for row in &row_set.rows {
            for header in &row_set.columns {
                let value = row.get(header).map(Self::display_value).unwrap_or_default();
                result.push_str(&Self::cell(&value));
            }
            result.push('\n');
        }

        result
    }

    fn cell(text: &str) -> String {
        format!(" {:<width$}", text, width = COLUMN_WIDTH)
    }

    /// Display form of a dynamically typed value
    pub fn display_value(value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
