//! Backend client traits
//!
//! The console never talks to a database directly. Everything it needs from
//! the hosted service goes through these two traits.

use crate::schema::{Row, RowId, RowPage, RowRange};
use async_trait::async_trait;
use thiserror::Error;

/// Client handle for one connected backend
///
/// Every call is scoped to a table by name; rows are addressed only through
/// their `id` column.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Call the backend's `get_tables` procedure
    ///
    /// # Returns
    ///
    /// Table names in the order the backend produced them
    async fn list_tables(&self) -> Result<Vec<String>, BackendError>;

    /// Fetch one page of rows ordered ascending by `id`, with an exact count
    ///
    /// # Arguments
    ///
    /// * `table` - Name of the table
    /// * `range` - Half-open row window to return
    async fn fetch_page(&self, table: &str, range: RowRange) -> Result<RowPage, BackendError>;

    /// Insert a single record
    async fn insert_row(&self, table: &str, row: &Row) -> Result<(), BackendError>;

    /// Update the record whose `id` equals `id`
    async fn update_row(&self, table: &str, id: &RowId, row: &Row) -> Result<(), BackendError>;

    /// Delete the record whose `id` equals `id`
    async fn delete_row(&self, table: &str, id: &RowId) -> Result<(), BackendError>;
}

/// Builds a [`Backend`] from the credential pair the user typed in
///
/// Construction must not perform I/O; it can only fail on malformed input.
pub trait Connector: Send + Sync + 'static {
    type Backend: Backend;

    fn connect(&self, endpoint_url: &str, api_key: &str) -> Result<Self::Backend, BackendError>;
}

/// Backend error type
#[derive(Debug, Error)]
pub enum BackendError {
    /// Endpoint or key could not be turned into a client
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend answered with an error status
    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Table not found
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Row has no usable `id`
    #[error("Row has no id")]
    MissingRowId,

    /// Response body did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Local database error
    #[error("Database error: {0}")]
    Query(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            BackendError::Decode(error.to_string())
        } else {
            BackendError::Transport(error.to_string())
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for BackendError {
    fn from(error: sqlx::Error) -> Self {
        BackendError::Query(error.to_string())
    }
}
