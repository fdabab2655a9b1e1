//! Table selection and state endpoints

use axum::{
    extract::State,
    response::{Json, Redirect},
    Form,
};
use serde::Deserialize;
use tracing::debug;

use crate::api::ConsoleState;
use crate::backend::traits::Connector;
use crate::schema::BrowserSnapshot;

/// Table picked from the catalog; empty clears the selection
#[derive(Debug, Deserialize)]
pub struct SelectTableForm {
    #[serde(default)]
    pub table: String,
}

/// Handler for POST /tables/select
///
/// Selects the table and fetches its first page.
pub async fn select_table_handler<C: Connector>(
    State(state): State<ConsoleState<C>>,
    Form(form): Form<SelectTableForm>,
) -> Redirect {
    if let Err(error) = state.browser.select_table(&form.table).await {
        debug!(table = %form.table, error = %error, "Table selection did not succeed");
    }
    state.back_to_console()
}

/// Handler for GET /api/state
///
/// Returns the console state as JSON. The API key is never included.
pub async fn state_handler<C: Connector>(
    State(state): State<ConsoleState<C>>,
) -> Json<BrowserSnapshot> {
    Json(state.browser.snapshot().await)
}
