//! In-memory backend that records every call it receives

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_table_browser::schema::{cell_text, row_id};
use axum_table_browser::{Backend, BackendError, Connector, Row, RowId, RowPage, RowRange};
use serde_json::{json, Value};
use tokio::sync::oneshot;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub list_tables: usize,
    pub fetches: Vec<(String, RowRange)>,
    pub inserts: Vec<Row>,
    pub updates: Vec<(RowId, Row)>,
    pub deletes: Vec<RowId>,
}

#[derive(Default)]
struct Store {
    tables: BTreeMap<String, Vec<Row>>,
    calls: Calls,
    fail_catalog: bool,
    fail_fetch: bool,
    fail_insert: bool,
    fail_delete: bool,
    fail_update_ids: HashSet<String>,
    fetch_gate: Option<Gate>,
    update_gate: Option<Gate>,
}

/// Holds one call until released
struct Gate {
    /// Signalled when the call has been received
    entered: oneshot::Sender<()>,
    /// The call waits for this before doing its work
    release: oneshot::Receiver<()>,
}

impl Gate {
    fn pair() -> (Self, oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (entered_sender, entered_receiver) = oneshot::channel();
        let (release_sender, release_receiver) = oneshot::channel();
        let gate = Gate {
            entered: entered_sender,
            release: release_receiver,
        };
        (gate, entered_receiver, release_sender)
    }

    async fn pass(self) {
        let _ = self.entered.send(());
        let _ = self.release.await;
    }
}

/// Shared handle to the recorded store; clones see the same data
#[derive(Clone, Default)]
pub struct RecordingBackend {
    store: Arc<Mutex<Store>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table whose rows have ids `1..=count`
    pub fn with_table(self, table: &str, count: i64) -> Self {
        let rows = (1..=count)
            .map(|id| {
                let value = json!({"id": id, "name": format!("user {}", id), "age": 20 + id});
                serde_json::from_value(value).unwrap()
            })
            .collect();
        self.store.lock().unwrap().tables.insert(table.to_string(), rows);
        self
    }

    pub fn calls(&self) -> Calls {
        self.store.lock().unwrap().calls.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls().fetches.len()
    }

    pub fn ids(&self, table: &str) -> Vec<Value> {
        let store = self.store.lock().unwrap();
        store.tables[table].iter().map(|row| row["id"].clone()).collect()
    }

    pub fn row(&self, table: &str, id: i64) -> Option<Row> {
        let store = self.store.lock().unwrap();
        store.tables[table]
            .iter()
            .find(|row| row["id"] == json!(id))
            .cloned()
    }

    pub fn fail_catalog(&self) {
        self.store.lock().unwrap().fail_catalog = true;
    }

    pub fn fail_fetch(&self) {
        self.store.lock().unwrap().fail_fetch = true;
    }

    pub fn fail_delete(&self) {
        self.store.lock().unwrap().fail_delete = true;
    }

    pub fn fail_insert(&self) {
        self.store.lock().unwrap().fail_insert = true;
    }

    pub fn fail_update_of(&self, id: i64) {
        self.store.lock().unwrap().fail_update_ids.insert(id.to_string());
    }

    /// Hold the next fetch until the returned sender fires
    ///
    /// The receiver resolves once that fetch has reached the backend.
    pub fn hold_next_fetch(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (gate, entered, release) = Gate::pair();
        self.store.lock().unwrap().fetch_gate = Some(gate);
        (entered, release)
    }

    /// Hold the next update before it touches the table
    pub fn hold_next_update(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (gate, entered, release) = Gate::pair();
        self.store.lock().unwrap().update_gate = Some(gate);
        (entered, release)
    }
}

fn api_error(message: &str) -> BackendError {
    BackendError::Api {
        status: 400,
        message: message.to_string(),
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn list_tables(&self) -> Result<Vec<String>, BackendError> {
        let mut store = self.store.lock().unwrap();
        store.calls.list_tables += 1;
        if store.fail_catalog {
            return Err(api_error("function get_tables() does not exist"));
        }
        Ok(store.tables.keys().cloned().collect())
    }

    async fn fetch_page(&self, table: &str, range: RowRange) -> Result<RowPage, BackendError> {
        let (page, gate) = {
            let mut store = self.store.lock().unwrap();
            store.calls.fetches.push((table.to_string(), range));
            if store.fail_fetch {
                return Err(BackendError::Transport("connection reset".to_string()));
            }
            let rows = store
                .tables
                .get(table)
                .ok_or_else(|| BackendError::TableNotFound(table.to_string()))?;

            let start = (range.offset as usize).min(rows.len());
            let end = (range.end() as usize).min(rows.len());
            let page = RowPage {
                rows: rows[start..end].to_vec(),
                total_count: rows.len() as u64,
            };
            (page, store.fetch_gate.take())
        };

        if let Some(gate) = gate {
            gate.pass().await;
        }
        Ok(page)
    }

    async fn insert_row(&self, table: &str, row: &Row) -> Result<(), BackendError> {
        let mut store = self.store.lock().unwrap();
        store.calls.inserts.push(row.clone());
        if store.fail_insert {
            return Err(api_error("null value in column \"name\""));
        }

        let rows = store
            .tables
            .get_mut(table)
            .ok_or_else(|| BackendError::TableNotFound(table.to_string()))?;
        let next_id = rows
            .iter()
            .filter_map(|row| row["id"].as_i64())
            .max()
            .unwrap_or(0)
            + 1;
        let mut inserted = row.clone();
        inserted.entry("id").or_insert(json!(next_id));
        rows.push(inserted);
        Ok(())
    }

    async fn update_row(&self, table: &str, id: &RowId, row: &Row) -> Result<(), BackendError> {
        let gate = self.store.lock().unwrap().update_gate.take();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let mut store = self.store.lock().unwrap();
        store.calls.updates.push((id.clone(), row.clone()));
        if store.fail_update_ids.contains(&cell_text(id)) {
            return Err(api_error("update rejected"));
        }

        let rows = store
            .tables
            .get_mut(table)
            .ok_or_else(|| BackendError::TableNotFound(table.to_string()))?;
        if let Some(target) = rows
            .iter_mut()
            .find(|candidate| row_id(candidate).map(cell_text) == Some(cell_text(id)))
        {
            for (column, value) in row {
                target.insert(column.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn delete_row(&self, table: &str, id: &RowId) -> Result<(), BackendError> {
        let mut store = self.store.lock().unwrap();
        store.calls.deletes.push(id.clone());
        if store.fail_delete {
            return Err(api_error("permission denied for table"));
        }

        let rows = store
            .tables
            .get_mut(table)
            .ok_or_else(|| BackendError::TableNotFound(table.to_string()))?;
        rows.retain(|row| row_id(row).map(cell_text) != Some(cell_text(id)));
        Ok(())
    }
}

/// Connects every credential pair to the same recording backend
///
/// An endpoint of `"malformed"` fails like an unparseable URL.
#[derive(Clone)]
pub struct RecordingConnector {
    pub backend: RecordingBackend,
}

impl RecordingConnector {
    pub fn new(backend: RecordingBackend) -> Self {
        Self { backend }
    }
}

impl Connector for RecordingConnector {
    type Backend = RecordingBackend;

    fn connect(
        &self,
        endpoint_url: &str,
        _api_key: &str,
    ) -> Result<RecordingBackend, BackendError> {
        if endpoint_url == "malformed" {
            return Err(BackendError::InvalidConfiguration(
                "invalid endpoint URL".to_string(),
            ));
        }
        Ok(self.backend.clone())
    }
}
