// Data-access configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AppError, Result};

/// Settings for the pool, connector and statement executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// `sqlite://path/to/blog.db` or a bare path; `~` is expanded by the daemon
    pub database_url: String,
    pub max_connections: u32,
    /// Connections opened eagerly when the pool is built
    pub min_idle: u32,
    pub acquire_timeout_ms: u64,
    pub statement_timeout_ms: u64,
    /// Connections older than this are closed instead of reused
    pub max_lifetime_ms: u64,
    pub connect_attempts: u32,
    /// First retry delay; doubles per attempt
    pub connect_backoff_ms: u64,
    pub busy_timeout_ms: u64,
    /// Ping idle connections before handing them out
    pub test_on_checkout: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://blogstore.db".to_string(),
            max_connections: 10,
            min_idle: 0,
            acquire_timeout_ms: 30_000,
            statement_timeout_ms: 30_000,
            max_lifetime_ms: 1_800_000,
            connect_attempts: 3,
            connect_backoff_ms: 100,
            busy_timeout_ms: 5_000,
            test_on_checkout: false,
        }
    }
}

impl DataConfig {
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(AppError::Config("database_url is empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(AppError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.min_idle > self.max_connections {
            return Err(AppError::Config(format!(
                "min_idle ({}) exceeds max_connections ({})",
                self.min_idle, self.max_connections
            )));
        }
        if self.connect_attempts == 0 {
            return Err(AppError::Config(
                "connect_attempts must be at least 1".to_string(),
            ));
        }
        if self.acquire_timeout_ms == 0 || self.statement_timeout_ms == 0 {
            return Err(AppError::Config("timeouts must be positive".to_string()));
        }
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_millis(self.max_lifetime_ms)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
