//! Store configuration loaded from the environment.

use std::str::FromStr;
use std::time::Duration;

pub const DATABASE_URL_VAR: &str = "STOCKLEDGER_DATABASE_URL";
pub const MAX_CONNECTIONS_VAR: &str = "STOCKLEDGER_MAX_CONNECTIONS";
pub const BUSY_TIMEOUT_VAR: &str = "STOCKLEDGER_BUSY_TIMEOUT_MS";

const DEFAULT_DATABASE_URL: &str = "sqlite://warehouse.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 1;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// How to open the SQLite store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_url: String,
    /// Pool size. Writers are serialized by SQLite's write lock whatever the
    /// size; extra connections only let reads run alongside a write.
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn in_memory() -> Self {
        Self::new("sqlite::memory:")
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }

    /// Read the configuration from `STOCKLEDGER_*` variables.
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_env() -> Self {
        let database_url = std::env::var(DATABASE_URL_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let max_connections = env_or(MAX_CONNECTIONS_VAR, DEFAULT_MAX_CONNECTIONS).max(1);
        let busy_timeout_ms = env_or(BUSY_TIMEOUT_VAR, DEFAULT_BUSY_TIMEOUT_MS);

        Self {
            database_url,
            max_connections,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

fn env_or<T: FromStr + Copy + std::fmt::Display>(var: &str, default: T) -> T {
    match std::env::var(var) {
        Ok(raw) => parse_or(var, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(var: &str, raw: &str, default: T) -> T {
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(
            variable = var,
            value = raw,
            fallback = %default,
            "ignoring unparseable configuration value"
        );
        default
    })
}
