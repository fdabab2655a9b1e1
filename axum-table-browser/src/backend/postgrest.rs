//! PostgREST backend implementation
//!
//! Speaks the REST dialect used by hosted Supabase projects: tables live under
//! `{endpoint}/rest/v1/{table}` and remote procedures under
//! `{endpoint}/rest/v1/rpc/{name}`.

use crate::backend::traits::{Backend, BackendError, Connector};
use crate::schema::{cell_text, Row, RowId, RowPage, RowRange, TableEntry, ID_COLUMN};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

/// Procedure the backend operator must define for table discovery
pub const TABLE_LISTING_FUNCTION: &str = "get_tables";

const PREFER: &str = "Prefer";
const API_KEY_HEADER: &str = "apikey";

/// Timeout applied to every request unless configured otherwise
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds [`PostgrestBackend`] clients from endpoint and API key
#[derive(Debug, Clone)]
pub struct PostgrestConnector {
    request_timeout: Duration,
}

impl PostgrestConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for PostgrestConnector {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl Connector for PostgrestConnector {
    type Backend = PostgrestBackend;

    fn connect(&self, endpoint_url: &str, api_key: &str) -> Result<PostgrestBackend, BackendError> {
        PostgrestBackend::new(endpoint_url, api_key, self.request_timeout)
    }
}

/// PostgREST client handle
#[derive(Debug, Clone)]
pub struct PostgrestBackend {
    client: Client,
    rest_url: Url,
}

/// Error body PostgREST sends with non-2xx responses
#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
}

impl PostgrestBackend {
    /// Create a client for the given project endpoint
    ///
    /// No request is sent; only the URL and the key are checked.
    pub fn new(
        endpoint_url: &str,
        api_key: &str,
        request_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let mut base = Url::parse(endpoint_url.trim()).map_err(|error| {
            BackendError::InvalidConfiguration(format!("invalid endpoint URL: {}", error))
        })?;

        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(BackendError::InvalidConfiguration(format!(
                "endpoint URL must be http(s): {}",
                endpoint_url
            )));
        }

        // Url::join drops the last path segment unless the path ends with a slash
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let rest_url = base
            .join("rest/v1/")
            .map_err(|error| BackendError::InvalidConfiguration(error.to_string()))?;

        let client = Client::builder()
            .default_headers(Self::credential_headers(api_key.trim())?)
            .timeout(request_timeout)
            .build()
            .map_err(|error| BackendError::InvalidConfiguration(error.to_string()))?;

        Ok(Self { client, rest_url })
    }

    /// Headers that authenticate every request with the API key
    fn credential_headers(api_key: &str) -> Result<HeaderMap, BackendError> {
        let invalid_key = || {
            BackendError::InvalidConfiguration("API key is not a valid header value".to_string())
        };

        let mut key = HeaderValue::from_str(api_key).map_err(|_| invalid_key())?;
        key.set_sensitive(true);
        let mut bearer =
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| invalid_key())?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// URL of `rest/v1/` followed by the given path segments
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.rest_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                BackendError::InvalidConfiguration("endpoint URL cannot be a base".to_string())
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Equality filter on the `id` column
    fn id_filter(id: &RowId) -> [(&'static str, String); 1] {
        [(ID_COLUMN, format!("eq.{}", cell_text(id)))]
    }

    /// Turn a non-2xx response into an error, keeping PostgREST's message
    async fn check_status(
        response: Response,
        table: Option<&str>,
    ) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            if let Some(table) = table {
                return Err(BackendError::TableNotFound(table.to_string()));
            }
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<PostgrestErrorBody>(&body)
            .ok()
            .and_then(|error| error.message)
            .unwrap_or(body);

        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Total row count from a `Content-Range` header such as `0-9/25` or `*/0`
pub fn parse_content_range(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[async_trait]
impl Backend for PostgrestBackend {
    async fn list_tables(&self) -> Result<Vec<String>, BackendError> {
        let url = self.endpoint(&["rpc", TABLE_LISTING_FUNCTION])?;
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let response = Self::check_status(response, None).await?;

        let entries: Vec<TableEntry> = response.json().await?;
        Ok(entries.into_iter().map(|entry| entry.table_name).collect())
    }

    async fn fetch_page(&self, table: &str, range: RowRange) -> Result<RowPage, BackendError> {
        let url = self.endpoint(&[table])?;
        let response = self
            .client
            .get(url)
            .query(&[
                ("select", "*".to_string()),
                ("order", format!("{}.asc", ID_COLUMN)),
                ("offset", range.offset.to_string()),
                ("limit", range.limit.to_string()),
            ])
            .header(PREFER, "count=exact")
            .send()
            .await?;
        let response = Self::check_status(response, Some(table)).await?;

        let total_count = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range);

        let rows: Vec<Row> = response.json().await?;
        let total_count = total_count.unwrap_or(range.offset + rows.len() as u64);

        Ok(RowPage { rows, total_count })
    }

    async fn insert_row(&self, table: &str, row: &Row) -> Result<(), BackendError> {
        let url = self.endpoint(&[table])?;
        let response = self
            .client
            .post(url)
            .header(PREFER, "return=minimal")
            .json(&[row])
            .send()
            .await?;
        Self::check_status(response, Some(table)).await?;
        Ok(())
    }

    async fn update_row(&self, table: &str, id: &RowId, row: &Row) -> Result<(), BackendError> {
        let url = self.endpoint(&[table])?;
        let response = self
            .client
            .patch(url)
            .query(&Self::id_filter(id))
            .header(PREFER, "return=minimal")
            .json(row)
            .send()
            .await?;
        Self::check_status(response, Some(table)).await?;
        Ok(())
    }

    async fn delete_row(&self, table: &str, id: &RowId) -> Result<(), BackendError> {
        let url = self.endpoint(&[table])?;
        let response = self
            .client
            .delete(url)
            .query(&Self::id_filter(id))
            .send()
            .await?;
        Self::check_status(response, Some(table)).await?;
        Ok(())
    }
}
