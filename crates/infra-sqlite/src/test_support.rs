// Temporary database files for adapter tests

use std::path::PathBuf;

use blogstore_core::config::DataConfig;

/// Removes the database file (and its WAL companions) on drop
pub struct TempDb {
    path: PathBuf,
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.path.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

pub fn temp_config() -> (DataConfig, TempDb) {
    let path = std::env::temp_dir().join(format!("blogstore-test-{}.db", uuid::Uuid::new_v4()));
    let config = DataConfig {
        database_url: format!("sqlite://{}", path.display()),
        max_connections: 4,
        acquire_timeout_ms: 2_000,
        statement_timeout_ms: 5_000,
        connect_backoff_ms: 5,
        ..DataConfig::default()
    };
    (config, TempDb { path })
}

/// Migrated store over a fresh temporary database
pub async fn temp_store() -> (crate::SqliteStore, TempDb) {
    use std::sync::Arc;

    use blogstore_core::port::SystemTimeProvider;

    let (config, db) = temp_config();
    let pool = crate::create_pool(&config).await.unwrap();
    crate::run_migrations(&pool).await.unwrap();
    let store = crate::SqliteStore::new(
        pool,
        Arc::new(SystemTimeProvider),
        config.statement_timeout(),
    )
    .unwrap();
    (store, db)
}
