//! # axum-table-browser
//!
//! A browser-based table console for PostgREST backends (such as hosted
//! Supabase projects), easily integrable as an Axum router.
//!
//! ## Features
//!
//! - Connect with an endpoint URL and API key entered in the browser
//! - Table discovery through the backend's `get_tables` procedure
//! - Editable, schema-agnostic grid with offset pagination
//! - Insert, batch update and delete of rows keyed by their `id` column
//! - Local SQLite backend for demos and tests
//!
//! ## Security Warning
//!
//! **This is a development tool only!**
//!
//! - No authentication/authorization built-in
//! - Anyone who can reach the console can edit the connected backend
//! - Should never be exposed in production or public networks
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use axum_table_browser::TableBrowserLayer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .route("/", get(|| async { "Hello, World!" }))
//!         .merge(TableBrowserLayer::postgrest("/table-browser").into_router());
//!
//!     // Serve the application...
//! }
//! ```

// Public modules
pub mod api;
pub mod backend;
pub mod browser;
pub mod config;
pub mod frontend;
pub mod layer;
pub mod pagination;
pub mod schema;

// Public exports
pub use browser::{SaveReport, TableBrowser};
pub use config::ServerConfig;
pub use layer::TableBrowserLayer;
pub use pagination::{PageState, PaginationControl};
pub use schema::{BrowserSnapshot, Row, RowId, RowPage, RowRange};

// Re-export backends
pub use backend::postgrest::{PostgrestBackend, PostgrestConnector};
pub use backend::traits::{Backend, BackendError, Connector};

#[cfg(feature = "sqlite")]
pub use backend::sqlite::{SqliteBackend, SqliteConnector};

// Error type
use thiserror::Error;

/// Failures of the console operations
///
/// Each variant is logged where it happens; none of them is retried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Catalog error: {0}")]
    Catalog(#[source] BackendError),

    #[error("No table selected")]
    NoTableSelected,

    #[error("Fetch error: {0}")]
    Fetch(#[source] BackendError),

    #[error("Mutation error: {0}")]
    Mutation(#[source] BackendError),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
