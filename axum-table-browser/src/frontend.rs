//! Console page rendering and asset serving
//!
//! The page is rendered on the server from a [`BrowserSnapshot`] and talks
//! back through plain HTML forms, so the browser needs no script. The grid is
//! a single form: its buttons post to the save, insert and delete endpoints
//! through `formaction`, and it carries the fetch tag it was rendered from.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use include_dir::{include_dir, Dir};
use maud::{html, Markup, DOCTYPE};

use crate::api::ConsoleState;
use crate::backend::traits::Connector;
use crate::schema::BrowserSnapshot;

// Embed the assets directory at compile time
static ASSETS: Dir = include_dir!("$CARGO_MANIFEST_DIR/assets");

const STYLESHEET: &str = "browser.css";

/// Create a router for the console page and its assets
///
/// This returns a Router that serves:
/// - GET / -> the rendered console page
/// - GET /assets/* -> embedded static assets
pub fn create_frontend_router<C: Connector>(state: ConsoleState<C>) -> Router {
    Router::new()
        .route("/", get(serve_console_page::<C>))
        .route("/assets/{*path}", get(serve_static_asset))
        .with_state(state)
}

/// Render the console from the current browser state
///
/// The page is never cached since every form submission redirects here.
async fn serve_console_page<C: Connector>(State(state): State<ConsoleState<C>>) -> Response {
    let snapshot = state.browser.snapshot().await;
    let html = render_page(&snapshot, &state.base_path).into_string();

    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        html,
    )
        .into_response()
}

/// Serve embedded assets with proper MIME types
async fn serve_static_asset(Path(path): Path<String>) -> Response {
    match ASSETS.get_file(&path) {
        Some(file) => {
            let mime_type = mime_guess::from_path(&path)
                .first_or_octet_stream()
                .to_string();
            (
                [
                    (header::CONTENT_TYPE, mime_type),
                    (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
                ],
                Body::from(file.contents()),
            )
                .into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("Asset not found: {}", path),
        )
            .into_response(),
    }
}

/// Render the whole console page
pub fn render_page(snapshot: &BrowserSnapshot, base_path: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                title { "Table Browser" }
                link rel="stylesheet" href=(format!("{}/assets/{}", base_path, STYLESHEET));
            }
            body {
                div class="database-container" {
                    h1 class="title" { "Table Browser" }
                    (render_connect_form(snapshot, base_path))

                    @if snapshot.connected {
                        (render_table_select(snapshot, base_path))
                        @if snapshot.selected_table.is_some() {
                            (render_grid(snapshot, base_path))
                            (render_pagination(snapshot, base_path))
                        }
                        @if let Some(message) = &snapshot.message {
                            div class="message" { (message) }
                        }
                    } @else {
                        div { "Not connected to a backend" }
                    }

                    @if snapshot.loading {
                        div class="loading" { "Loading..." }
                    }
                }
            }
        }
    }
}

fn render_connect_form(snapshot: &BrowserSnapshot, base_path: &str) -> Markup {
    let endpoint = snapshot.endpoint_url.as_deref().unwrap_or_default();
    html! {
        form method="post" action=(format!("{}/connect", base_path)) {
            div {
                label for="endpoint_url" { "Project URL:" }
                input type="text" class="connect-input" id="endpoint_url" name="endpoint_url"
                    value=(endpoint);
            }
            div {
                label for="api_key" { "API Key:" }
                // Never prefilled
                input type="password" class="connect-input" id="api_key" name="api_key"
                    autocomplete="off";
            }
            button type="submit" class="connect-button" { "Connect" }
        }
    }
}

fn render_table_select(snapshot: &BrowserSnapshot, base_path: &str) -> Markup {
    let selected = snapshot.selected_table.as_deref();
    html! {
        form method="post" action=(format!("{}/tables/select", base_path)) {
            select class="table-select" name="table" {
                option value="" { "Select a table" }
                @for table in &snapshot.tables {
                    option value=(table) selected[selected == Some(table.as_str())] { (table) }
                }
            }
            button type="submit" { "Open" }
        }
    }
}

fn render_grid(snapshot: &BrowserSnapshot, base_path: &str) -> Markup {
    html! {
        form method="post" action=(format!("{}/rows/save", base_path)) {
            input type="hidden" name="tag" value=(snapshot.fetch_tag);
            table class="table" {
                thead {
                    tr {
                        @for column in &snapshot.columns {
                            th class="table-header" { (column) }
                        }
                        th class="table-header" { "Actions" }
                    }
                }
                tbody {
                    @for (row_index, cells) in snapshot.rows.iter().enumerate() {
                        tr {
                            @for (column, text) in snapshot.columns.iter().zip(cells) {
                                td {
                                    input class="input-field"
                                        name=(format!("cell.{}.{}", row_index, column))
                                        value=(text);
                                }
                            }
                            td {
                                button type="submit" class="delete-button"
                                    formaction=(format!("{}/rows/delete", base_path))
                                    name="row" value=(row_index)
                                    disabled[!is_deletable(snapshot, row_index)] {
                                    "Delete"
                                }
                            }
                        }
                    }

                    // Insert row, only once the columns are known from a fetched row
                    @if !snapshot.columns.is_empty() {
                        tr {
                            @for column in &snapshot.columns {
                                td {
                                    input class="input-field"
                                        name=(format!("new.{}", column))
                                        value=(pending_value(snapshot, column));
                                }
                            }
                            td {
                                button type="submit" class="add-button"
                                    formaction=(format!("{}/rows/insert", base_path)) {
                                    "Add"
                                }
                            }
                        }
                    }
                }
            }
            button type="submit" class="save-button" { "Save Changes" }
        }
    }
}

fn is_deletable(snapshot: &BrowserSnapshot, row_index: usize) -> bool {
    snapshot.deletable.get(row_index).copied().unwrap_or(false)
}

fn pending_value<'a>(snapshot: &'a BrowserSnapshot, column: &str) -> &'a str {
    snapshot
        .pending_new_row
        .iter()
        .find(|(name, _)| name == column)
        .map(|(_, text)| text.as_str())
        .unwrap_or_default()
}

fn render_pagination(snapshot: &BrowserSnapshot, base_path: &str) -> Markup {
    let page = &snapshot.page;
    html! {
        @if snapshot.pagination.shows_navigation() {
            form method="post" action=(format!("{}/rows/page", base_path)) class="pagination" {
                button type="submit" class="prev-button" name="page"
                    value=(page.current_page.saturating_sub(1))
                    disabled[!snapshot.has_previous_page] {
                    "Previous"
                }
                span { (page.current_page) }
                button type="submit" class="next-button" name="page"
                    value=(page.current_page + 1) disabled[!snapshot.has_next_page] {
                    "Next"
                }
            }
        }
        form method="post" action=(format!("{}/rows/per-page", base_path)) class="pagination" {
            label for="rows_per_page" { "Rows per page:" }
            input type="number" min="1" id="rows_per_page" name="rows_per_page"
                value=(page.rows_per_page);
            button type="submit" { "Apply" }
        }
    }
}
