use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

/// One row: column name to dynamically typed scalar
pub type Record = Map<String, Value>;

/// Ordered query result
///
/// `columns` is the authoritative header order. It comes from the store's
/// statement metadata when fresh, or from the cached payload when reloaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

/// On-cache layouts accepted by [`RowSet::from_payload`]
#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Framed(RowSet),
    /// `null` is how an empty legacy result was stored
    Bare(Option<Vec<Record>>),
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Record>) -> Self {
        Self { columns, rows }
    }

    /// Build a row set whose headers come from the first record's keys
    pub fn from_records(rows: Vec<Record>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Encode for storage in the cache
    pub fn to_payload(&self) -> Result<String, AppError> {
        serde_json::to_string(self).map_err(|e| {
            AppError::Serialization(format!("Failed to encode result set: {}", e))
        })
    }

    /// Decode a cached payload
    ///
    /// Accepts both `{"columns": [...], "rows": [...]}` and a bare array of
    /// objects. The bare form falls back to first-row headers.
    pub fn from_payload(payload: &str) -> Result<Self, AppError> {
        let decoded: Payload = serde_json::from_str(payload).map_err(|e| {
            AppError::Render(format!("Failed to decode cached result: {}", e))
        })?;

        Ok(match decoded {
            Payload::Framed(row_set) => row_set,
            Payload::Bare(rows) => Self::from_records(rows.unwrap_or_default()),
        })
    }
}
