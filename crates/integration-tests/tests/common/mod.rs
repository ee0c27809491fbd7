//! Shared setup: a migrated store over a throwaway database file

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use blogstore_core::domain::NewPost;
use blogstore_core::port::{ManualTimeProvider, TimeProvider};
use blogstore_core::DataConfig;
use blogstore_infra_sqlite::{create_pool, run_migrations, SqlitePool, SqliteStore};
use chrono::{TimeZone, Utc};

pub struct TestDb {
    path: PathBuf,
}

impl Drop for TestDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.path.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

pub fn config(max_connections: u32) -> (DataConfig, TestDb) {
    let path = std::env::temp_dir().join(format!("blogstore-it-{}.db", uuid::Uuid::new_v4()));
    let config = DataConfig {
        database_url: format!("sqlite://{}", path.display()),
        max_connections,
        acquire_timeout_ms: 5_000,
        statement_timeout_ms: 5_000,
        connect_backoff_ms: 5,
        ..DataConfig::default()
    };
    (config, TestDb { path })
}

pub async fn migrated_pool(max_connections: u32) -> (SqlitePool, DataConfig, TestDb) {
    let (config, db) = config(max_connections);
    let pool = create_pool(&config).await.unwrap();
    run_migrations(&pool).await.unwrap();
    (pool, config, db)
}

pub fn manual_clock() -> Arc<ManualTimeProvider> {
    Arc::new(ManualTimeProvider::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    ))
}

pub async fn store_with_clock(
    max_connections: u32,
    clock: Arc<dyn TimeProvider>,
) -> (SqliteStore, TestDb) {
    let (pool, config, db) = migrated_pool(max_connections).await;
    let store = SqliteStore::new(pool, clock, config.statement_timeout()).unwrap();
    (store, db)
}

pub async fn store(max_connections: u32) -> (SqliteStore, TestDb) {
    store_with_clock(max_connections, manual_clock()).await
}

pub fn new_post(title: &str, tags: &[&str]) -> NewPost {
    NewPost {
        title: title.to_string(),
        text: format!("Body of {}", title),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub const SHORT: Duration = Duration::from_millis(100);
