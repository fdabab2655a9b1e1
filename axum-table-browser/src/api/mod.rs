//! Form endpoints and the JSON state endpoint
//!
//! Every form handler calls one [`TableBrowser`] operation and answers with a
//! redirect back to the console page. Operation failures are already logged by
//! the browser and only show up in the operator log.

use axum::{
    response::Redirect,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::backend::traits::Connector;
use crate::browser::TableBrowser;

pub mod connection;
pub mod rows;
pub mod tables;

// Re-export handlers for convenience
pub use connection::connect_handler;
pub use rows::{
    change_page_handler, delete_row_handler, insert_row_handler, rows_per_page_handler,
    save_changes_handler,
};
pub use tables::{select_table_handler, state_handler};

/// Router state shared by the API and the frontend
pub struct ConsoleState<C: Connector> {
    pub browser: Arc<TableBrowser<C>>,
    pub base_path: Arc<String>,
}

impl<C: Connector> ConsoleState<C> {
    pub fn new(browser: Arc<TableBrowser<C>>, base_path: impl Into<String>) -> Self {
        Self {
            browser,
            base_path: Arc::new(base_path.into()),
        }
    }

    /// `303 See Other` back to the console page
    pub fn back_to_console(&self) -> Redirect {
        if self.base_path.is_empty() {
            Redirect::to("/")
        } else {
            Redirect::to(&self.base_path)
        }
    }
}

// Manual impl: the connector itself does not need to be Clone
impl<C: Connector> Clone for ConsoleState<C> {
    fn clone(&self) -> Self {
        Self {
            browser: self.browser.clone(),
            base_path: self.base_path.clone(),
        }
    }
}

/// Create the API router with all endpoints
///
/// # Arguments
///
/// * `state` - Browser and base path shared with the frontend
///
/// # Returns
///
/// An Axum Router configured with all form and API routes
pub fn create_api_router<C: Connector>(state: ConsoleState<C>) -> Router {
    Router::new()
        .route("/connect", post(connect_handler::<C>))
        .route("/tables/select", post(select_table_handler::<C>))
        .route("/rows/page", post(change_page_handler::<C>))
        .route("/rows/per-page", post(rows_per_page_handler::<C>))
        .route("/rows/save", post(save_changes_handler::<C>))
        .route("/rows/insert", post(insert_row_handler::<C>))
        .route("/rows/delete", post(delete_row_handler::<C>))
        .route("/api/state", get(state_handler::<C>))
        .with_state(state)
}
