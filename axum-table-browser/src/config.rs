//! Server configuration
//!
//! Hosting settings come from `TABLE_BROWSER_*` environment variables. Backend
//! credentials are never read from here; they are typed into the console.

use std::time::Duration;

use tracing::warn;

use crate::backend::postgrest::DEFAULT_REQUEST_TIMEOUT;
use crate::pagination::DEFAULT_ROWS_PER_PAGE;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BASE_PATH: &str = "/table-browser";

/// Settings for hosting the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Mount point of the console, without a trailing slash
    pub base_path: String,

    /// Initial page size of the grid
    pub rows_per_page: u64,

    /// Timeout for each request to the backend
    pub request_timeout: Duration,

    /// SQLite URL of a local demo database, if any
    pub demo_database: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            base_path: DEFAULT_BASE_PATH.to_string(),
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            demo_database: None,
        }
    }
}

impl ServerConfig {
    /// Load from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup; unset or invalid values keep their default
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let host = lookup("TABLE_BROWSER_HOST")
            .filter(|host| !host.trim().is_empty())
            .unwrap_or(defaults.host);
        let port = parse_or("TABLE_BROWSER_PORT", &lookup, defaults.port, |port| *port > 0);
        let base_path = lookup("TABLE_BROWSER_BASE_PATH")
            .map(|path| normalize_base_path(&path))
            .unwrap_or(defaults.base_path);
        let rows_per_page = parse_or(
            "TABLE_BROWSER_ROWS_PER_PAGE",
            &lookup,
            defaults.rows_per_page,
            |rows| *rows >= 1,
        );
        let timeout_seconds = parse_or(
            "TABLE_BROWSER_REQUEST_TIMEOUT_SECS",
            &lookup,
            defaults.request_timeout.as_secs(),
            |seconds| *seconds >= 1,
        );
        let demo_database =
            lookup("TABLE_BROWSER_DEMO_DATABASE").filter(|url| !url.trim().is_empty());

        Self {
            host,
            port,
            base_path,
            rows_per_page,
            request_timeout: Duration::from_secs(timeout_seconds),
            demo_database,
        }
    }

    /// `host:port` for binding the listener
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(
    key: &str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
    valid: impl Fn(&T) -> bool,
) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) if valid(&value) => value,
            _ => {
                warn!(
                    key,
                    value = %raw,
                    default = %default,
                    "Ignoring invalid configuration value"
                );
                default
            }
        },
    }
}

/// Leading slash, no trailing slash; the root mount becomes an empty string
pub fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
