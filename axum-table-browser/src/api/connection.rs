//! Connect endpoint

use axum::{extract::State, response::Redirect, Form};
use serde::Deserialize;
use tracing::debug;

use crate::api::ConsoleState;
use crate::backend::traits::Connector;

/// Credentials typed into the connect form
#[derive(Debug, Deserialize)]
pub struct ConnectForm {
    #[serde(default)]
    pub endpoint_url: String,
    #[serde(default)]
    pub api_key: String,
}

/// Handler for POST /connect
///
/// Builds a new client handle from the submitted credentials and loads the
/// table catalog. A failed attempt leaves the console disconnected.
pub async fn connect_handler<C: Connector>(
    State(state): State<ConsoleState<C>>,
    Form(form): Form<ConnectForm>,
) -> Redirect {
    if let Err(error) = state.browser.connect(&form.endpoint_url, &form.api_key).await {
        debug!(error = %error, "Connect request did not succeed");
    }
    state.back_to_console()
}
