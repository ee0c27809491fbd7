// Store wiring: prepared statements shared by repositories and units of work

use std::sync::Arc;
use std::time::Duration;

use crate::comment_repository::{CommentStatements, SqliteCommentRepository};
use crate::connection::SqlitePool;
use crate::post_repository::{PostStatements, SqlitePostRepository};
use crate::transaction::SqliteTransactionCoordinator;
use blogstore_core::error::Result;
use blogstore_core::port::TimeProvider;

/// Everything a repository call needs besides the connection
pub(crate) struct StoreContext {
    pub(crate) posts: PostStatements,
    pub(crate) comments: CommentStatements,
    pub(crate) clock: Arc<dyn TimeProvider>,
    pub(crate) statement_timeout: Duration,
}

/// Entry point of the SQLite adapter
///
/// Prepares (and placeholder-checks) every fixed statement once, then hands out
/// repositories and a transaction coordinator sharing the same pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    ctx: Arc<StoreContext>,
    coordinator: SqliteTransactionCoordinator,
}

impl SqliteStore {
    pub fn new(
        pool: SqlitePool,
        clock: Arc<dyn TimeProvider>,
        statement_timeout: Duration,
    ) -> Result<Self> {
        let ctx = Arc::new(StoreContext {
            posts: PostStatements::prepare()?,
            comments: CommentStatements::prepare()?,
            clock,
            statement_timeout,
        });
        let coordinator = SqliteTransactionCoordinator::new(pool.clone(), Arc::clone(&ctx));

        Ok(Self {
            pool,
            ctx,
            coordinator,
        })
    }

    pub fn posts(&self) -> SqlitePostRepository {
        SqlitePostRepository::new(
            self.pool.clone(),
            Arc::clone(&self.ctx),
            self.coordinator.clone(),
        )
    }

    pub fn comments(&self) -> SqliteCommentRepository {
        SqliteCommentRepository::new(self.pool.clone(), Arc::clone(&self.ctx))
    }

    pub fn coordinator(&self) -> SqliteTransactionCoordinator {
        self.coordinator.clone()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
