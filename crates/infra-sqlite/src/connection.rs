// SQLite Connector & Pool Setup

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection};
use std::str::FromStr;
use tracing::debug;

use crate::pool::{ConnectionPool, ManageConnection, PoolConfig, PooledConnection};
use blogstore_core::config::DataConfig;
use blogstore_core::error::{AppError, Result};

/// Pool of SQLite connections
pub type SqlitePool = ConnectionPool<SqliteConnector>;

/// One checked-out SQLite connection
pub type SqlitePooledConnection = PooledConnection<SqliteConnector>;

/// Opens SQLite connections with WAL mode, a busy timeout and foreign keys on
pub struct SqliteConnector {
    options: SqliteConnectOptions,
}

impl SqliteConnector {
    pub fn new(config: &DataConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| AppError::Config(format!("invalid database_url: {}", e)))?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout())
            .foreign_keys(true)
            .create_if_missing(true);

        Ok(Self { options })
    }
}

#[async_trait]
impl ManageConnection for SqliteConnector {
    type Connection = SqliteConnection;

    async fn connect(&self) -> Result<SqliteConnection> {
        self.options
            .connect()
            .await
            .map_err(|e| AppError::ConnectionUnavailable(e.to_string()))
    }

    async fn is_valid(&self, conn: &mut SqliteConnection) -> Result<()> {
        conn.ping()
            .await
            .map_err(|e| AppError::ConnectionUnavailable(e.to_string()))
    }

    async fn disconnect(&self, conn: SqliteConnection) {
        if let Err(e) = conn.close().await {
            debug!(error = %e, "error while closing connection");
        }
    }
}

/// Create the SQLite connection pool
pub async fn create_pool(config: &DataConfig) -> Result<SqlitePool> {
    config.validate()?;
    let connector = SqliteConnector::new(config)?;
    ConnectionPool::new(connector, PoolConfig::from(config)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_config;

    #[tokio::test]
    async fn test_create_pool() {
        let (config, _guard) = temp_config();
        let pool = create_pool(&config).await.unwrap();
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let (config, _guard) = temp_config();
        let pool = create_pool(&config).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_ping_on_checkout() {
        let (mut config, _guard) = temp_config();
        config.test_on_checkout = true;
        let pool = create_pool(&config).await.unwrap();

        drop(pool.acquire().await.unwrap());
        let conn = pool.acquire().await.unwrap();
        assert_eq!(conn.id(), 1);
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let config = DataConfig {
            database_url: "sqlite://blog.db?mode=sideways".to_string(),
            ..DataConfig::default()
        };
        assert!(matches!(
            SqliteConnector::new(&config),
            Err(AppError::Config(_))
        ));
    }
}
