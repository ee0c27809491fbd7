// DI wiring: pool, migrations, schema check, store, services

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use blogstore_core::application::{CommentService, PostService};
use blogstore_core::domain::{COMMENT_SCHEMA, POST_SCHEMA};
use blogstore_core::port::SystemTimeProvider;
use blogstore_core::DataConfig;
use blogstore_infra_sqlite::{create_pool, run_migrations, verify_schemas, SqlitePool, SqliteStore};

pub struct App {
    pub pool: SqlitePool,
    pub posts: PostService,
    pub comments: CommentService,
}

impl App {
    pub async fn start(config: &DataConfig) -> Result<Self> {
        info!(database_url = %config.database_url, "Initializing database...");

        let pool = create_pool(config)
            .await
            .context("DB pool creation failed")?;
        run_migrations(&pool).await.context("Migration failed")?;
        verify_schemas(&pool, &[&POST_SCHEMA, &COMMENT_SCHEMA])
            .await
            .context("Schema check failed")?;

        let store = SqliteStore::new(
            pool.clone(),
            Arc::new(SystemTimeProvider),
            config.statement_timeout(),
        )?;

        let posts = Arc::new(store.posts());
        let posts_service = PostService::new(posts.clone());
        let comments_service = CommentService::new(
            Arc::new(store.comments()),
            posts,
            Arc::new(store.coordinator()),
        );

        let status = pool.status();
        info!(open = status.open, max = status.max, "Data core ready");

        Ok(Self {
            pool,
            posts: posts_service,
            comments: comments_service,
        })
    }

    pub async fn shutdown(self) {
        info!("Closing connection pool...");
        self.pool.close().await;
        let metrics = self.pool.metrics();
        info!(
            created = metrics.connections_created,
            closed = metrics.connections_closed,
            checkouts = metrics.checkouts_successful,
            "Connection pool closed"
        );
    }
}
