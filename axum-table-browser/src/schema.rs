//! Data types shared by the backends, the browser state and the HTTP surface
//!
//! Rows are schema-agnostic: a row is whatever JSON object the backend returns,
//! and its column set is discovered from the first row of a page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pagination::{PageState, PaginationControl};

/// A single table row, column name to scalar value
pub type Row = serde_json::Map<String, Value>;

/// Value of a row's `id` column, the only predicate used for update and delete
pub type RowId = Value;

/// Column every table is expected to carry as its unique key
pub const ID_COLUMN: &str = "id";

/// Entry returned by the backend's `get_tables` procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub table_name: String,
}

/// Half-open row range `[offset, offset + limit)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    pub offset: u64,
    pub limit: u64,
}

impl RowRange {
    /// Exclusive end of the range
    pub fn end(&self) -> u64 {
        self.offset + self.limit
    }

    /// Inclusive index of the last row, as used by HTTP `Range` style headers
    pub fn last(&self) -> u64 {
        self.end().saturating_sub(1)
    }
}

/// One counted page of rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowPage {
    /// Rows in ascending `id` order
    pub rows: Vec<Row>,

    /// Exact number of rows in the table
    pub total_count: u64,
}

/// Extract the `id` of a row, if it has one
pub fn row_id(row: &Row) -> Option<&RowId> {
    row.get(ID_COLUMN).filter(|value| !value.is_null())
}

/// Render a cell the way the grid displays and edits it
///
/// `null` becomes an empty string, strings are shown without quotes, and every
/// other value uses its JSON text.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Column names of a page, taken from its first row
pub fn columns_of(rows: &[Row]) -> Vec<String> {
    rows.first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}

/// Serializable view of the console, used by the renderer and the JSON API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserSnapshot {
    pub connected: bool,

    /// Endpoint of the live connection; the API key is never exposed
    pub endpoint_url: Option<String>,

    pub tables: Vec<String>,
    pub selected_table: Option<String>,

    /// Columns of the current page, from its first row
    pub columns: Vec<String>,

    /// Edit buffer rows rendered as display text, in column order
    pub rows: Vec<Vec<String>>,

    /// Whether each row carries an `id` and can be deleted
    pub deletable: Vec<bool>,

    /// Fields typed so far for the next insert
    pub pending_new_row: Vec<(String, String)>,

    pub page: PageState,
    pub pagination: PaginationControl,
    pub has_previous_page: bool,
    pub has_next_page: bool,

    pub loading: bool,
    pub message: Option<String>,

    /// Tag of the fetch the grid was filled from
    pub fetch_tag: u64,
}
