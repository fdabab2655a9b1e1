//! The table browser component
//!
//! [`TableBrowser`] owns the whole console state: the connection, the table
//! catalog, the displayed page with its edit buffer, the pending insert and the
//! pagination cursor. Every operation is an explicit async method; the HTTP
//! handlers call them directly.
//!
//! State is guarded by a mutex that is never held across a backend call.
//! Row fetches are tagged with a monotonically increasing number and a
//! response is applied only if no newer fetch was started in the meantime.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::backend::traits::{Backend, BackendError, Connector};
use crate::pagination::{PageState, PaginationControl, DEFAULT_ROWS_PER_PAGE};
use crate::schema::{cell_text, columns_of, row_id, BrowserSnapshot, Row, RowId};
use crate::{Error, Result};

pub const CHANGES_SAVED_MESSAGE: &str = "Changes saved successfully!";
pub const ROW_ADDED_MESSAGE: &str = "Row added successfully!";
pub const ROW_DELETED_MESSAGE: &str = "Row deleted successfully!";

/// One cell edit submitted from the grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellEdit {
    pub row: usize,
    pub column: String,
    pub text: String,
}

/// Outcome of a batch save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Update calls issued, one per buffered row
    pub attempted: usize,
    /// Updates that failed and were logged
    pub failed: usize,
}

struct Connection<B> {
    endpoint_url: String,
    backend: Arc<B>,
}

struct BrowserState<B> {
    connection: Option<Connection<B>>,
    /// Bumped on every connect so late catalog answers can be recognized
    connection_generation: u64,
    tables: Vec<String>,
    selected_table: Option<String>,
    rows: Vec<Row>,
    edit_buffer: Vec<Row>,
    pending_new_row: Row,
    page: PageState,
    loading: bool,
    message: Option<String>,
    /// Tag of the most recently started fetch
    fetch_tag: u64,
    /// Tag of the fetch the grid currently shows
    shown_tag: u64,
}

impl<B> BrowserState<B> {
    fn new(rows_per_page: u64) -> Self {
        Self {
            connection: None,
            connection_generation: 0,
            tables: Vec::new(),
            selected_table: None,
            rows: Vec::new(),
            edit_buffer: Vec::new(),
            pending_new_row: Row::new(),
            page: PageState::new(rows_per_page),
            loading: false,
            message: None,
            fetch_tag: 0,
            shown_tag: 0,
        }
    }

    fn backend(&self) -> Result<Arc<B>> {
        self.connection
            .as_ref()
            .map(|connection| connection.backend.clone())
            .ok_or(Error::NotConnected)
    }

    fn selected_table(&self) -> Result<String> {
        self.selected_table.clone().ok_or(Error::NoTableSelected)
    }

    /// Empty the grid and invalidate any fetch still in flight
    ///
    /// The invalidated fetch will not lower the loading flag, so it is
    /// lowered here.
    fn clear_grid(&mut self) {
        self.rows.clear();
        self.edit_buffer.clear();
        self.page.total_count = 0;
        self.loading = false;
        self.fetch_tag += 1;
        self.shown_tag = self.fetch_tag;
    }

    /// Drop everything tied to the previous connection
    fn reset(&mut self, connection: Option<Connection<B>>) {
        self.connection = connection;
        self.connection_generation += 1;
        self.tables.clear();
        self.selected_table = None;
        self.pending_new_row.clear();
        self.page = PageState::new(self.page.rows_per_page);
        self.message = None;
        self.clear_grid();
    }

    fn ensure_shown(&self, tag: u64) -> Result<()> {
        if tag != self.shown_tag {
            return Err(Error::Validation(format!(
                "grid was rendered from fetch {} but now shows fetch {}",
                tag, self.shown_tag
            )));
        }
        Ok(())
    }

    fn edit_cell(&mut self, edit: CellEdit) -> Result<bool> {
        if !columns_of(&self.rows).contains(&edit.column) {
            return Err(Error::Validation(format!("unknown column '{}'", edit.column)));
        }
        let row = self.edit_buffer.get_mut(edit.row).ok_or_else(|| {
            Error::Validation(format!("row {} is not on the current page", edit.row))
        })?;

        let unchanged = row
            .get(&edit.column)
            .map(|value| cell_text(value) == edit.text)
            .unwrap_or(edit.text.is_empty());
        if unchanged {
            return Ok(false);
        }

        row.insert(edit.column, Value::String(edit.text));
        Ok(true)
    }

    /// Apply a batch of grid edits, skipping invalid ones
    fn apply_edits(&mut self, edits: Vec<CellEdit>) -> usize {
        let mut changed = 0;
        for edit in edits {
            match self.edit_cell(edit) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(error) => warn!(error = %error, "Skipping cell edit"),
            }
        }
        changed
    }

    /// Pair every buffered row with the `id` it was fetched with
    ///
    /// The predicate uses the id as fetched, so editing the id cell updates
    /// the original row.
    fn save_targets(&mut self) -> Result<SaveBatch<B>> {
        let backend = self.backend()?;
        let table = self.selected_table()?;
        let targets = self
            .rows
            .iter()
            .zip(self.edit_buffer.iter())
            .map(|(original, edited)| (row_id(original).cloned(), edited.clone()))
            .collect();

        self.loading = true;
        Ok(SaveBatch {
            backend,
            table,
            targets,
        })
    }
}

/// Everything a batch save needs once the lock is released
struct SaveBatch<B> {
    backend: Arc<B>,
    table: String,
    targets: Vec<(Option<RowId>, Row)>,
}

/// Stateful console over one backend connection at a time
pub struct TableBrowser<C: Connector> {
    connector: C,
    state: Mutex<BrowserState<C::Backend>>,
}

impl<C: Connector> TableBrowser<C> {
    /// Create a disconnected browser
    pub fn new(connector: C) -> Self {
        Self::with_rows_per_page(connector, DEFAULT_ROWS_PER_PAGE)
    }

    /// Create a disconnected browser with a custom initial page size
    pub fn with_rows_per_page(connector: C, rows_per_page: u64) -> Self {
        Self {
            connector,
            state: Mutex::new(BrowserState::new(rows_per_page.max(1))),
        }
    }

    /// Build a client handle from the credential pair and load the catalog
    ///
    /// Blank input is rejected and leaves the current state alone. Malformed
    /// input drops any existing connection.
    pub async fn connect(&self, endpoint_url: &str, api_key: &str) -> Result<()> {
        let endpoint_url = endpoint_url.trim();
        let api_key = api_key.trim();

        {
            let mut state = self.state.lock().await;

            if endpoint_url.is_empty() || api_key.is_empty() {
                let error =
                    Error::Connection("endpoint URL and API key are both required".to_string());
                error!(error = %error, "Error connecting to backend");
                return Err(error);
            }

            match self.connector.connect(endpoint_url, api_key) {
                Ok(backend) => {
                    state.reset(Some(Connection {
                        endpoint_url: endpoint_url.to_string(),
                        backend: Arc::new(backend),
                    }));
                    info!(endpoint = %endpoint_url, "Connected to backend");
                }
                Err(backend_error) => {
                    state.reset(None);
                    let error = Error::Connection(backend_error.to_string());
                    error!(endpoint = %endpoint_url, error = %error, "Error connecting to backend");
                    return Err(error);
                }
            }
        }

        if self.load_catalog().await.is_err() {
            warn!("Connected without a table catalog");
        }
        Ok(())
    }

    /// Fill the table list from the backend's table listing procedure
    ///
    /// On failure the list is left empty.
    pub async fn load_catalog(&self) -> Result<()> {
        let (backend, generation) = {
            let mut state = self.state.lock().await;
            let backend = state
                .backend()
                .inspect_err(|error| error!(error = %error, "Error fetching tables"))?;
            state.loading = true;
            (backend, state.connection_generation)
        };

        let result = backend.list_tables().await;

        let mut state = self.state.lock().await;
        if state.connection_generation != generation {
            debug!("Discarding table catalog of a replaced connection");
            return Ok(());
        }
        state.loading = false;

        match result {
            Ok(tables) => {
                debug!(count = tables.len(), "Loaded table catalog");
                state.tables = tables;
                Ok(())
            }
            Err(backend_error) => {
                state.tables.clear();
                error!(error = %backend_error, "Error fetching tables");
                Err(Error::Catalog(backend_error))
            }
        }
    }

    /// Select a table from the catalog and fetch its first page
    ///
    /// An empty name clears the selection.
    pub async fn select_table(&self, table: &str) -> Result<()> {
        let table = table.trim();
        {
            let mut state = self.state.lock().await;
            state
                .backend()
                .inspect_err(|error| error!(error = %error, "Error selecting table"))?;

            if table.is_empty() {
                state.selected_table = None;
                state.pending_new_row.clear();
                state.message = None;
                state.clear_grid();
                return Ok(());
            }

            if !state.tables.iter().any(|name| name == table) {
                let error = Error::Validation(format!("unknown table '{}'", table));
                error!(error = %error, "Error selecting table");
                return Err(error);
            }

            state.selected_table = Some(table.to_string());
            state.page = PageState::new(state.page.rows_per_page);
            state.pending_new_row.clear();
            state.message = None;
            state.clear_grid();
        }

        self.fetch_rows().await
    }

    /// Fetch the current page of the selected table
    ///
    /// Replaces the displayed rows and the edit buffer and updates the total
    /// count. A response that was overtaken by a newer fetch is dropped.
    pub async fn fetch_rows(&self) -> Result<()> {
        let (backend, table, range, tag) = {
            let mut state = self.state.lock().await;
            let prepared = state.backend().and_then(|backend| {
                let table = state.selected_table()?;
                state.page.validate()?;
                Ok((backend, table))
            });
            let (backend, table) = match prepared {
                Ok(prepared) => prepared,
                Err(error) => {
                    error!(error = %error, "Error fetching rows");
                    return Err(error);
                }
            };

            state.loading = true;
            state.fetch_tag += 1;
            (backend, table, state.page.range(), state.fetch_tag)
        };

        debug!(table = %table, offset = range.offset, limit = range.limit, tag, "Fetching rows");
        let result = backend.fetch_page(&table, range).await;

        let mut state = self.state.lock().await;
        if tag != state.fetch_tag {
            debug!(table = %table, tag, latest = state.fetch_tag, "Discarding superseded row page");
            return Ok(());
        }
        state.loading = false;

        match result {
            Ok(page) => {
                state.rows = page.rows.clone();
                state.edit_buffer = page.rows;
                state.page.total_count = page.total_count;
                state.shown_tag = tag;
                Ok(())
            }
            Err(backend_error) => {
                error!(table = %table, error = %backend_error, "Error fetching rows");
                Err(Error::Fetch(backend_error))
            }
        }
    }

    /// Move to another page of the selected table
    ///
    /// Pages outside `[1, page_count]` are rejected without a request.
    pub async fn change_page(&self, page: u64) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            let checked = state
                .selected_table()
                .and_then(|_| state.page.check_page(page))
                .inspect_err(|error| error!(error = %error, "Invalid page number"))?;
            state.page.current_page = checked;
        }

        self.fetch_rows().await
    }

    /// Change the page size and go back to the first page
    pub async fn set_rows_per_page(&self, rows_per_page: u64) -> Result<()> {
        let table_selected = {
            let mut state = self.state.lock().await;
            if rows_per_page < 1 {
                let error = Error::Validation("rows per page must be at least 1".to_string());
                error!(error = %error, "Invalid rows per page");
                return Err(error);
            }
            state.page.rows_per_page = rows_per_page;
            state.page.current_page = 1;
            state.selected_table.is_some()
        };

        if table_selected {
            self.fetch_rows().await
        } else {
            Ok(())
        }
    }

    /// Edit one cell of the edit buffer
    ///
    /// The text is stored as a plain string. Returns whether the buffer
    /// changed; text equal to the current display text leaves the cell alone.
    pub async fn edit_cell(&self, row: usize, column: &str, text: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        state
            .edit_cell(CellEdit {
                row,
                column: column.to_string(),
                text: text.to_string(),
            })
            .inspect_err(|error| error!(error = %error, "Error editing cell"))
    }

    /// Apply a batch of edits submitted from a grid rendered at `tag`
    ///
    /// The whole batch is rejected if the grid has been refetched since.
    pub async fn apply_edits(&self, tag: u64, edits: Vec<CellEdit>) -> Result<usize> {
        let mut state = self.state.lock().await;
        state
            .ensure_shown(tag)
            .inspect_err(|error| error!(error = %error, "Rejecting stale grid edits"))?;
        Ok(state.apply_edits(edits))
    }

    /// Set a field of the row that the next insert will submit
    ///
    /// Blank text removes the field so the backend can apply its default.
    pub async fn set_new_row_field(&self, column: &str, text: &str) {
        let mut state = self.state.lock().await;
        if text.is_empty() {
            state.pending_new_row.remove(column);
        } else {
            state
                .pending_new_row
                .insert(column.to_string(), Value::String(text.to_string()));
        }
    }

    /// Insert the pending row into the selected table
    ///
    /// On success the pending row is cleared and the page refetched; on
    /// failure the pending row is kept for another attempt.
    pub async fn insert_row(&self) -> Result<()> {
        let (backend, table, row) = {
            let state = self.state.lock().await;
            let backend = state
                .backend()
                .inspect_err(|error| error!(error = %error, "Error adding row"))?;
            let table = state
                .selected_table()
                .inspect_err(|error| error!(error = %error, "Error adding row"))?;
            (backend, table, state.pending_new_row.clone())
        };

        if let Err(backend_error) = backend.insert_row(&table, &row).await {
            error!(table = %table, error = %backend_error, "Error adding row");
            return Err(Error::Mutation(backend_error));
        }

        {
            let mut state = self.state.lock().await;
            state.pending_new_row.clear();
            state.message = Some(ROW_ADDED_MESSAGE.to_string());
        }
        self.refresh().await;
        Ok(())
    }

    /// Write every buffered row back with one update per row
    ///
    /// Rows are not dirty-tracked and the batch is not atomic: each failure is
    /// logged and the loop carries on. One refresh follows, whatever happened.
    pub async fn save_changes(&self) -> Result<SaveReport> {
        let batch = {
            let mut state = self.state.lock().await;
            state
                .save_targets()
                .inspect_err(|error| error!(error = %error, "Error saving changes"))?
        };
        self.run_save(batch).await
    }

    /// Apply edits from a grid rendered at `tag` and save the page
    ///
    /// The edits and the rows to save are taken under one lock, so a refetch
    /// cannot slip in between them.
    pub async fn save_edits(&self, tag: u64, edits: Vec<CellEdit>) -> Result<SaveReport> {
        let batch = {
            let mut state = self.state.lock().await;
            state
                .ensure_shown(tag)
                .inspect_err(|error| error!(error = %error, "Rejecting stale grid edits"))?;
            let changed = state.apply_edits(edits);
            debug!(changed, "Applied grid edits");
            state
                .save_targets()
                .inspect_err(|error| error!(error = %error, "Error saving changes"))?
        };
        self.run_save(batch).await
    }

    async fn run_save(&self, batch: SaveBatch<C::Backend>) -> Result<SaveReport> {
        let SaveBatch {
            backend,
            table,
            targets,
        } = batch;

        let mut report = SaveReport::default();
        for (id, row) in &targets {
            report.attempted += 1;
            let result = match id {
                Some(id) => backend.update_row(&table, id, row).await,
                None => Err(BackendError::MissingRowId),
            };
            if let Err(backend_error) = result {
                report.failed += 1;
                error!(table = %table, error = %backend_error, "Error updating row");
            }
        }
        info!(
            table = %table,
            attempted = report.attempted,
            failed = report.failed,
            "Saved edit buffer"
        );

        {
            let mut state = self.state.lock().await;
            state.message = Some(CHANGES_SAVED_MESSAGE.to_string());
            // The refresh raises it again if it runs
            state.loading = false;
        }
        self.refresh().await;
        Ok(report)
    }

    /// Delete the row whose `id` equals `id` from the selected table
    pub async fn delete_row(&self, id: &RowId) -> Result<()> {
        let (backend, table) = {
            let state = self.state.lock().await;
            let backend = state
                .backend()
                .inspect_err(|error| error!(error = %error, "Error deleting row"))?;
            let table = state
                .selected_table()
                .inspect_err(|error| error!(error = %error, "Error deleting row"))?;
            (backend, table)
        };

        if let Err(backend_error) = backend.delete_row(&table, id).await {
            error!(table = %table, id = %id, error = %backend_error, "Error deleting row");
            return Err(Error::Mutation(backend_error));
        }

        {
            let mut state = self.state.lock().await;
            state.message = Some(ROW_DELETED_MESSAGE.to_string());
        }
        self.refresh().await;
        Ok(())
    }

    /// `id` of a displayed row, for a grid rendered at `tag`
    pub async fn row_id_at(&self, tag: u64, row: usize) -> Result<RowId> {
        let state = self.state.lock().await;
        state
            .ensure_shown(tag)
            .and_then(|_| {
                state
                    .rows
                    .get(row)
                    .and_then(row_id)
                    .cloned()
                    .ok_or(Error::Mutation(BackendError::MissingRowId))
            })
            .inspect_err(|error| error!(error = %error, "Error resolving row"))
    }

    /// Refetch after a mutation; failures are already logged by the fetch
    async fn refresh(&self) {
        if let Err(error) = self.fetch_rows().await {
            debug!(error = %error, "Refresh after mutation did not complete");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connection.is_some()
    }

    pub async fn page_state(&self) -> PageState {
        self.state.lock().await.page
    }

    /// Rows of the current page as fetched
    pub async fn rows(&self) -> Vec<Row> {
        self.state.lock().await.rows.clone()
    }

    pub async fn edit_buffer(&self) -> Vec<Row> {
        self.state.lock().await.edit_buffer.clone()
    }

    pub async fn pending_new_row(&self) -> Row {
        self.state.lock().await.pending_new_row.clone()
    }

    /// Serializable view of the current state
    pub async fn snapshot(&self) -> BrowserSnapshot {
        let state = self.state.lock().await;
        let columns = columns_of(&state.rows);

        let rows = state
            .edit_buffer
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| row.get(column).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();
        let deletable = state.rows.iter().map(|row| row_id(row).is_some()).collect();
        let pending_new_row = state
            .pending_new_row
            .iter()
            .map(|(column, value)| (column.clone(), cell_text(value)))
            .collect();

        BrowserSnapshot {
            connected: state.connection.is_some(),
            endpoint_url: state
                .connection
                .as_ref()
                .map(|connection| connection.endpoint_url.clone()),
            tables: state.tables.clone(),
            selected_table: state.selected_table.clone(),
            columns,
            rows,
            deletable,
            pending_new_row,
            page: state.page,
            pagination: PaginationControl::compute(state.selected_table.is_some(), &state.page),
            has_previous_page: state.page.has_previous(),
            has_next_page: state.page.has_next(),
            loading: state.loading,
            message: state.message.clone(),
            fetch_tag: state.shown_tag,
        }
    }
}
