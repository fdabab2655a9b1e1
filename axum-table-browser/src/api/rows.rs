//! Row endpoints: pagination, batch save, insert and delete

use axum::{extract::State, response::Redirect, Form};
use serde::Deserialize;
use tracing::debug;

use crate::api::ConsoleState;
use crate::backend::traits::Connector;
use crate::browser::CellEdit;

/// Fields of the grid form
///
/// The grid posts `tag`, every cell as `cell.{row}.{column}`, every insert
/// field as `new.{column}` and, for deletes, the clicked `row`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GridForm {
    pub tag: Option<u64>,
    pub row: Option<usize>,
    pub cells: Vec<CellEdit>,
    pub new_fields: Vec<(String, String)>,
}

impl GridForm {
    /// Sort the raw form fields; unknown or malformed names are skipped
    pub fn parse(fields: Vec<(String, String)>) -> Self {
        let mut form = GridForm::default();

        for (name, value) in fields {
            if name == "tag" {
                form.tag = value.trim().parse().ok();
            } else if name == "row" {
                form.row = value.trim().parse().ok();
            } else if let Some(rest) = name.strip_prefix("cell.") {
                // Column names may contain dots, row indexes cannot
                let Some((row, column)) = rest.split_once('.') else {
                    continue;
                };
                if let Ok(row) = row.parse() {
                    form.cells.push(CellEdit {
                        row,
                        column: column.to_string(),
                        text: value,
                    });
                }
            } else if let Some(column) = name.strip_prefix("new.") {
                form.new_fields.push((column.to_string(), value));
            }
        }

        form
    }
}

#[derive(Debug, Deserialize)]
pub struct PageForm {
    #[serde(default)]
    pub page: String,
}

#[derive(Debug, Deserialize)]
pub struct RowsPerPageForm {
    #[serde(default)]
    pub rows_per_page: String,
}

/// Handler for POST /rows/page
///
/// Moves to the requested page. Pages outside the known range are rejected
/// before any request is made.
pub async fn change_page_handler<C: Connector>(
    State(state): State<ConsoleState<C>>,
    Form(form): Form<PageForm>,
) -> Redirect {
    match form.page.trim().parse::<u64>() {
        Ok(page) => {
            if let Err(error) = state.browser.change_page(page).await {
                debug!(page, error = %error, "Page change did not succeed");
            }
        }
        Err(_) => debug!(page = %form.page, "Ignoring non-numeric page"),
    }
    state.back_to_console()
}

/// Handler for POST /rows/per-page
pub async fn rows_per_page_handler<C: Connector>(
    State(state): State<ConsoleState<C>>,
    Form(form): Form<RowsPerPageForm>,
) -> Redirect {
    match form.rows_per_page.trim().parse::<u64>() {
        Ok(rows_per_page) => {
            if let Err(error) = state.browser.set_rows_per_page(rows_per_page).await {
                debug!(rows_per_page, error = %error, "Page size change did not succeed");
            }
        }
        Err(_) => debug!(rows_per_page = %form.rows_per_page, "Ignoring non-numeric page size"),
    }
    state.back_to_console()
}

/// Handler for POST /rows/save
///
/// Applies the submitted cells to the edit buffer, then updates every row of
/// the page. Nothing is saved if the grid was rendered from an older fetch.
pub async fn save_changes_handler<C: Connector>(
    State(state): State<ConsoleState<C>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Redirect {
    let form = GridForm::parse(fields);
    let Some(tag) = form.tag else {
        debug!("Ignoring save without a grid tag");
        return state.back_to_console();
    };

    if let Err(error) = state.browser.save_edits(tag, form.cells).await {
        debug!(error = %error, "Save did not run");
    }
    state.back_to_console()
}

/// Handler for POST /rows/insert
///
/// Stores the typed fields as the pending row and submits it.
pub async fn insert_row_handler<C: Connector>(
    State(state): State<ConsoleState<C>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Redirect {
    let form = GridForm::parse(fields);
    for (column, text) in &form.new_fields {
        state.browser.set_new_row_field(column, text).await;
    }

    if let Err(error) = state.browser.insert_row().await {
        debug!(error = %error, "Insert did not succeed");
    }
    state.back_to_console()
}

/// Handler for POST /rows/delete
///
/// Deletes the clicked row by the `id` it had when the grid was rendered.
pub async fn delete_row_handler<C: Connector>(
    State(state): State<ConsoleState<C>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Redirect {
    let form = GridForm::parse(fields);
    let (Some(tag), Some(row)) = (form.tag, form.row) else {
        debug!("Ignoring delete without a grid tag and row");
        return state.back_to_console();
    };

    match state.browser.row_id_at(tag, row).await {
        Ok(id) => {
            if let Err(error) = state.browser.delete_row(&id).await {
                debug!(error = %error, "Delete did not succeed");
            }
        }
        Err(error) => debug!(error = %error, "Delete target not resolved"),
    }
    state.back_to_console()
}
