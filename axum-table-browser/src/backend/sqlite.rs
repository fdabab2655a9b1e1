//! SQLite backend implementation
//!
//! A local stand-in for the hosted service, used by the example server's demo
//! mode and by tests. It answers the same calls as the REST backend: the table
//! listing reads `sqlite_master`, and rows are addressed by their `id` column.

use crate::backend::traits::{Backend, BackendError, Connector};
use crate::schema::{Row, RowId, RowPage, RowRange, ID_COLUMN};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteColumn, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef};

/// Hands out [`SqliteBackend`] handles
///
/// With a shared pool the endpoint is only a label; otherwise the endpoint is
/// opened as a SQLite URL without connecting until the first query.
#[derive(Debug, Clone, Default)]
pub struct SqliteConnector {
    shared: Option<SqlitePool>,
}

impl SqliteConnector {
    /// Open each endpoint as its own SQLite URL
    pub fn new() -> Self {
        Self { shared: None }
    }

    /// Serve every connection from an already opened pool
    pub fn shared(pool: SqlitePool) -> Self {
        Self { shared: Some(pool) }
    }
}

impl Connector for SqliteConnector {
    type Backend = SqliteBackend;

    fn connect(&self, endpoint_url: &str, _api_key: &str) -> Result<SqliteBackend, BackendError> {
        let pool = match &self.shared {
            Some(pool) => pool.clone(),
            None => SqlitePoolOptions::new()
                .connect_lazy(endpoint_url.trim())
                .map_err(|error| BackendError::InvalidConfiguration(error.to_string()))?,
        };
        Ok(SqliteBackend::new(pool))
    }
}

/// SQLite client handle
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// # Arguments
    ///
    /// * `pool` - SQLite connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Quote an identifier (table or column name) to prevent SQL injection
    ///
    /// SQLite uses double quotes for identifiers. This function escapes any
    /// double quotes in the identifier by doubling them.
    fn quote_identifier(identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    /// Convert a SQLite row to a JSON object
    fn row_to_json(row: &SqliteRow) -> Result<Row, BackendError> {
        let mut map = Row::new();

        for column in row.columns() {
            let value = Self::extract_column_value(row, column)?;
            map.insert(column.name().to_string(), value);
        }

        Ok(map)
    }

    /// Extract a column value from a SQLite row and convert to JSON
    ///
    /// SQLite reports declared affinities, but a cell may hold any storage
    /// class. The declared type is tried first, then the common types in order.
    fn extract_column_value(row: &SqliteRow, column: &SqliteColumn) -> Result<Value, BackendError> {
        let column_name = column.name();

        if row.try_get_raw(column_name)?.is_null() {
            return Ok(Value::Null);
        }

        match column.type_info().name() {
            "INTEGER" | "BIGINT" => {
                if let Ok(value) = row.try_get::<i64, _>(column_name) {
                    return Ok(Value::Number(value.into()));
                }
            }
            "REAL" | "FLOAT" | "DOUBLE" => {
                if let Ok(value) = row.try_get::<f64, _>(column_name) {
                    if let Some(number) = serde_json::Number::from_f64(value) {
                        return Ok(Value::Number(number));
                    }
                }
            }
            "BOOLEAN" | "BOOL" => {
                if let Ok(value) = row.try_get::<bool, _>(column_name) {
                    return Ok(Value::Bool(value));
                }
            }
            _ => {}
        }

        if let Ok(value) = row.try_get::<String, _>(column_name) {
            return Ok(Value::String(value));
        }
        if let Ok(value) = row.try_get::<i64, _>(column_name) {
            return Ok(Value::Number(value.into()));
        }
        if let Ok(value) = row.try_get::<f64, _>(column_name) {
            if let Some(number) = serde_json::Number::from_f64(value) {
                return Ok(Value::Number(number));
            }
        }
        if let Ok(value) = row.try_get::<Vec<u8>, _>(column_name) {
            return Ok(Value::String(format!("[BLOB: {} bytes]", value.len())));
        }

        Ok(Value::Null)
    }

    /// Bind a JSON value with the closest SQLite storage class
    fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
        match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(flag) => query.bind(*flag),
            Value::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    query.bind(integer)
                } else if let Some(float) = number.as_f64() {
                    query.bind(float)
                } else {
                    query.bind(number.to_string())
                }
            }
            Value::String(text) => query.bind(text.clone()),
            other => query.bind(other.to_string()),
        }
    }

    /// Fail with `TableNotFound` unless `table` is a user table
    async fn ensure_table(&self, table: &str) -> Result<(), BackendError> {
        let table_exists: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM sqlite_master \
             WHERE type='table' AND name = ? AND name NOT LIKE 'sqlite_%'",
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;

        if table_exists.is_none() {
            return Err(BackendError::TableNotFound(table.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn list_tables(&self) -> Result<Vec<String>, BackendError> {
        let query = "SELECT name AS table_name FROM sqlite_master \
                     WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            tables.push(row.try_get::<String, _>("table_name")?);
        }
        Ok(tables)
    }

    async fn fetch_page(&self, table: &str, range: RowRange) -> Result<RowPage, BackendError> {
        self.ensure_table(table).await?;

        let count_query = format!("SELECT COUNT(*) FROM {}", Self::quote_identifier(table));
        let total: i64 = sqlx::query_scalar(&count_query).fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM {} ORDER BY {} ASC LIMIT ? OFFSET ?",
            Self::quote_identifier(table),
            Self::quote_identifier(ID_COLUMN)
        );
        let rows = sqlx::query(&select_query)
            .bind(range.limit as i64)
            .bind(range.offset as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut json_rows = Vec::with_capacity(rows.len());
        for row in &rows {
            json_rows.push(Self::row_to_json(row)?);
        }

        Ok(RowPage {
            rows: json_rows,
            total_count: total as u64,
        })
    }

    async fn insert_row(&self, table: &str, row: &Row) -> Result<(), BackendError> {
        self.ensure_table(table).await?;

        let statement = if row.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", Self::quote_identifier(table))
        } else {
            let columns: Vec<String> = row
                .keys()
                .map(|column| Self::quote_identifier(column))
                .collect();
            let placeholders = vec!["?"; row.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                Self::quote_identifier(table),
                columns.join(", "),
                placeholders
            )
        };

        let mut query = sqlx::query(&statement);
        for value in row.values() {
            query = Self::bind_value(query, value);
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    async fn update_row(&self, table: &str, id: &RowId, row: &Row) -> Result<(), BackendError> {
        self.ensure_table(table).await?;

        // The id column is written too, so an edited id renames the row
        if row.is_empty() {
            return Ok(());
        }

        let set_clause: Vec<String> = row
            .keys()
            .map(|column| format!("{} = ?", Self::quote_identifier(column)))
            .collect();
        let statement = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            Self::quote_identifier(table),
            set_clause.join(", "),
            Self::quote_identifier(ID_COLUMN)
        );

        let mut query = sqlx::query(&statement);
        for value in row.values() {
            query = Self::bind_value(query, value);
        }
        query = Self::bind_value(query, id);
        query.execute(&self.pool).await?;
        Ok(())
    }

    async fn delete_row(&self, table: &str, id: &RowId) -> Result<(), BackendError> {
        self.ensure_table(table).await?;

        let statement = format!(
            "DELETE FROM {} WHERE {} = ?",
            Self::quote_identifier(table),
            Self::quote_identifier(ID_COLUMN)
        );
        Self::bind_value(sqlx::query(&statement), id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn memory_backend() -> SqliteBackend {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE people (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, age INTEGER)",
        )
        .execute(&pool)
        .await
        .unwrap();
        SqliteBackend::new(pool)
    }

    fn row(value: Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(SqliteBackend::quote_identifier("users"), "\"users\"");
        assert_eq!(
            SqliteBackend::quote_identifier("table\"name"),
            "\"table\"\"name\""
        );
    }

    #[tokio::test]
    async fn test_crud_cycle() {
        let backend = memory_backend().await;
        assert_eq!(backend.list_tables().await.unwrap(), vec!["people".to_string()]);

        backend
            .insert_row("people", &row(json!({"name": "Ada", "age": 36})))
            .await
            .unwrap();
        backend
            .insert_row("people", &row(json!({"name": "Grace"})))
            .await
            .unwrap();

        let page = backend
            .fetch_page("people", RowRange { offset: 0, limit: 10 })
            .await
            .unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.rows[0]["name"], json!("Ada"));
        assert_eq!(page.rows[1]["age"], Value::Null);

        // Text bound into an INTEGER column comes back as a number
        backend
            .update_row("people", &json!(2), &row(json!({"id": 2, "name": "Grace", "age": "42"})))
            .await
            .unwrap();
        let page = backend
            .fetch_page("people", RowRange { offset: 1, limit: 1 })
            .await
            .unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0]["age"], json!(42));

        backend.delete_row("people", &json!(1)).await.unwrap();
        let page = backend
            .fetch_page("people", RowRange { offset: 0, limit: 10 })
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.rows[0]["id"], json!(2));
    }

    #[tokio::test]
    async fn test_update_can_change_id() {
        let backend = memory_backend().await;
        backend
            .insert_row("people", &row(json!({"name": "Ada"})))
            .await
            .unwrap();

        backend
            .update_row("people", &json!(1), &row(json!({"id": "9", "name": "Ada"})))
            .await
            .unwrap();
        let page = backend
            .fetch_page("people", RowRange { offset: 0, limit: 10 })
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.rows[0]["id"], json!(9));
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let backend = memory_backend().await;
        let result = backend
            .fetch_page("missing", RowRange { offset: 0, limit: 10 })
            .await;
        assert!(matches!(result, Err(BackendError::TableNotFound(_))));
    }
}
