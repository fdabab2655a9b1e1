//! TableBrowserLayer - Main Axum integration layer
//!
//! This module provides the main entry point for mounting the console into an
//! Axum application.

use crate::api::{create_api_router, ConsoleState};
use crate::backend::postgrest::PostgrestConnector;
use crate::backend::traits::Connector;
use crate::browser::TableBrowser;
use crate::config::{normalize_base_path, ServerConfig};
use crate::frontend::create_frontend_router;
use crate::pagination::DEFAULT_ROWS_PER_PAGE;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[cfg(feature = "sqlite")]
use crate::backend::sqlite::SqliteConnector;

/// Main layer for mounting the table browser into an Axum application
///
/// # Example
///
/// ```rust,no_run
/// use axum::Router;
/// use axum_table_browser::TableBrowserLayer;
///
/// let console = TableBrowserLayer::postgrest("/table-browser");
/// let app: Router = Router::new().merge(console.into_router());
/// ```
pub struct TableBrowserLayer<C: Connector> {
    base_path: String,
    browser: Arc<TableBrowser<C>>,
}

impl<C: Connector> TableBrowserLayer<C> {
    /// Create a new console at the given base path
    ///
    /// # Arguments
    ///
    /// * `base_path` - The URL path where the console will be mounted (e.g., "/table-browser")
    /// * `connector` - Builds backend clients from the credentials typed in
    pub fn new(base_path: impl Into<String>, connector: C) -> Self {
        Self::with_rows_per_page(base_path, connector, DEFAULT_ROWS_PER_PAGE)
    }

    /// Create a new console with a custom initial page size
    pub fn with_rows_per_page(
        base_path: impl Into<String>,
        connector: C,
        rows_per_page: u64,
    ) -> Self {
        Self {
            base_path: normalize_base_path(&base_path.into()),
            browser: Arc::new(TableBrowser::with_rows_per_page(connector, rows_per_page)),
        }
    }

    /// The browser behind the console, for driving it outside of HTTP
    pub fn browser(&self) -> Arc<TableBrowser<C>> {
        self.browser.clone()
    }

    /// Convert into an Axum Router that can be merged
    ///
    /// The returned router includes:
    /// - Console page at `{base_path}/`
    /// - Form and JSON endpoints below `{base_path}/`
    /// - Permissive CORS middleware for development
    pub fn into_router(self) -> Router {
        let state = ConsoleState::new(self.browser, self.base_path.clone());

        let console_router = create_api_router(state.clone()).merge(create_frontend_router(state));

        // Axum refuses to nest at the root, merge instead
        let router = if self.base_path.is_empty() {
            Router::new().merge(console_router)
        } else {
            Router::new().nest(&self.base_path, console_router)
        };

        router.layer(CorsLayer::permissive())
    }
}

impl TableBrowserLayer<PostgrestConnector> {
    /// Create a console for PostgREST backends with default settings
    ///
    /// # Arguments
    ///
    /// * `base_path` - The URL path where the console will be mounted
    pub fn postgrest(base_path: impl Into<String>) -> Self {
        Self::new(base_path, PostgrestConnector::default())
    }

    /// Create a console for PostgREST backends from server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::with_rows_per_page(
            config.base_path.clone(),
            PostgrestConnector::new(config.request_timeout),
            config.rows_per_page,
        )
    }
}

#[cfg(feature = "sqlite")]
impl TableBrowserLayer<SqliteConnector> {
    /// Create a console over a local SQLite pool
    ///
    /// # Arguments
    ///
    /// * `base_path` - The URL path where the console will be mounted
    /// * `pool` - The SQLite connection pool every connection is served from
    pub fn sqlite(base_path: impl Into<String>, pool: sqlx::SqlitePool) -> Self {
        Self::new(base_path, SqliteConnector::shared(pool))
    }
}
