// SQLite Transaction Implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::comment_repository;
use crate::connection::{SqlitePool, SqlitePooledConnection};
use crate::executor::Executor;
use crate::post_repository;
use crate::store::StoreContext;
use blogstore_core::domain::{
    Comment, CommentFilter, CommentId, CommentPatch, NewComment, NewPost, Page, Pagination, Post,
    PostFilter, PostId, PostPatch,
};
use blogstore_core::error::{AppError, Result};
use blogstore_core::port::{
    CommentRepositoryTx, PostRepositoryTx, TransactionCoordinator, UnitOfWork, UnitState,
};

/// Opens units of work on connections borrowed from the pool
#[derive(Clone)]
pub struct SqliteTransactionCoordinator {
    pool: SqlitePool,
    ctx: Arc<StoreContext>,
    next_id: Arc<AtomicU64>,
}

impl SqliteTransactionCoordinator {
    pub(crate) fn new(pool: SqlitePool, ctx: Arc<StoreContext>) -> Self {
        Self {
            pool,
            ctx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

#[async_trait]
impl TransactionCoordinator for SqliteTransactionCoordinator {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let mut conn = self.pool.acquire().await?;

        // Take the write lock up front so two units never deadlock upgrading
        Executor::new(&mut conn, self.ctx.statement_timeout)
            .control("BEGIN IMMEDIATE")
            .await?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(unit_id = id, connection_id = conn.id(), "unit of work started");

        Ok(Box::new(SqliteUnitOfWork {
            id,
            conn,
            state: UnitState::Active,
            failed: false,
            ctx: Arc::clone(&self.ctx),
        }))
    }
}

pub struct SqliteUnitOfWork {
    id: u64,
    conn: SqlitePooledConnection,
    state: UnitState,
    /// Set once any statement of the unit has failed; such a unit never commits
    failed: bool,
    ctx: Arc<StoreContext>,
}

impl SqliteUnitOfWork {
    fn exec(&mut self) -> Executor<'_> {
        Executor::new(&mut self.conn, self.ctx.statement_timeout)
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            debug!(unit_id = self.id, error = %err, "statement failed, unit will roll back");
            self.failed = true;
        }
        result
    }

    async fn roll_back(&mut self) -> Result<()> {
        self.state = UnitState::RolledBack;

        if self.conn.is_broken() {
            // Closing the connection abandons whatever it had open
            return Err(AppError::TransactionFailed(format!(
                "unit {} lost its connection",
                self.id
            )));
        }

        let outcome = self.exec().control("ROLLBACK").await;
        if let Err(err) = outcome {
            self.conn.mark_broken();
            return Err(AppError::TransactionFailed(format!(
                "rollback of unit {} failed: {}",
                self.id, err
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    fn id(&self) -> u64 {
        self.id
    }

    fn state(&self) -> UnitState {
        self.state
    }

    fn posts(&mut self) -> &mut dyn PostRepositoryTx {
        self
    }

    fn comments(&mut self) -> &mut dyn CommentRepositoryTx {
        self
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        if self.failed {
            warn!(unit_id = self.id, "commit requested after a failed statement, rolling back");
            if let Err(rollback_err) = self.roll_back().await {
                debug!(unit_id = self.id, error = %rollback_err, "rollback of failed unit");
            }
            return Err(AppError::TransactionFailed(format!(
                "unit {} had a failed statement and was rolled back",
                self.id
            )));
        }

        let outcome = self.exec().control("COMMIT").await;
        match outcome {
            Ok(()) => {
                self.state = UnitState::Committed;
                debug!(unit_id = self.id, "unit of work committed");
                Ok(())
            }
            Err(err) => {
                warn!(unit_id = self.id, error = %err, "commit failed, rolling back");
                if let Err(rollback_err) = self.roll_back().await {
                    debug!(unit_id = self.id, error = %rollback_err, "rollback after failed commit");
                }
                Err(AppError::TransactionFailed(format!(
                    "commit of unit {} failed: {}",
                    self.id, err
                )))
            }
        }
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.roll_back().await?;
        debug!(unit_id = self.id, "unit of work rolled back");
        Ok(())
    }
}

impl Drop for SqliteUnitOfWork {
    fn drop(&mut self) {
        if self.state == UnitState::Active {
            warn!(unit_id = self.id, "unit of work dropped while active, discarding connection");
            self.conn.mark_broken();
        }
    }
}

#[async_trait]
impl PostRepositoryTx for SqliteUnitOfWork {
    async fn find_by_id(&mut self, id: PostId) -> Result<Post> {
        let ctx = Arc::clone(&self.ctx);
        let result = post_repository::find_by_id(&mut self.exec(), &ctx, id).await;
        self.track(result)
    }

    async fn find_all(&mut self, filter: &PostFilter, pagination: Pagination) -> Result<Page<Post>> {
        let result = post_repository::find_all(&mut self.exec(), filter, pagination).await;
        self.track(result)
    }

    async fn insert(&mut self, post: &NewPost) -> Result<Post> {
        let ctx = Arc::clone(&self.ctx);
        let result = post_repository::insert(&mut self.exec(), &ctx, post).await;
        self.track(result)
    }

    async fn update(&mut self, id: PostId, patch: &PostPatch) -> Result<Post> {
        let ctx = Arc::clone(&self.ctx);
        let result = post_repository::update(&mut self.exec(), &ctx, id, patch).await;
        self.track(result)
    }

    async fn delete(&mut self, id: PostId) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let result = post_repository::delete(&mut self.exec(), &ctx, id).await;
        self.track(result)
    }

    async fn add_like(&mut self, id: PostId) -> Result<Post> {
        let ctx = Arc::clone(&self.ctx);
        let result = post_repository::add_like(&mut self.exec(), &ctx, id).await;
        self.track(result)
    }
}

#[async_trait]
impl CommentRepositoryTx for SqliteUnitOfWork {
    async fn find_by_id(&mut self, id: CommentId) -> Result<Comment> {
        let ctx = Arc::clone(&self.ctx);
        let result = comment_repository::find_by_id(&mut self.exec(), &ctx, id).await;
        self.track(result)
    }

    async fn find_all(
        &mut self,
        filter: CommentFilter,
        pagination: Pagination,
    ) -> Result<Page<Comment>> {
        let ctx = Arc::clone(&self.ctx);
        let result = comment_repository::find_all(&mut self.exec(), &ctx, filter, pagination).await;
        self.track(result)
    }

    async fn insert(&mut self, comment: &NewComment) -> Result<Comment> {
        let ctx = Arc::clone(&self.ctx);
        let result = comment_repository::insert(&mut self.exec(), &ctx, comment).await;
        self.track(result)
    }

    async fn update(&mut self, id: CommentId, patch: &CommentPatch) -> Result<Comment> {
        let ctx = Arc::clone(&self.ctx);
        let result = comment_repository::update(&mut self.exec(), &ctx, id, patch).await;
        self.track(result)
    }

    async fn delete(&mut self, id: CommentId) -> Result<()> {
        let ctx = Arc::clone(&self.ctx);
        let result = comment_repository::delete(&mut self.exec(), &ctx, id).await;
        self.track(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_store;
    use blogstore_core::port::PostRepository;

    fn new_post(title: &str) -> NewPost {
        NewPost {
            title: title.to_string(),
            text: "body".to_string(),
            tags: vec!["rust".to_string()],
        }
    }

    #[tokio::test]
    async fn test_commit_persists() {
        let (store, _db) = temp_store().await;
        let coordinator = store.coordinator();

        let mut unit = coordinator.begin().await.unwrap();
        assert_eq!(unit.state(), UnitState::Active);
        let post = unit.posts().insert(&new_post("kept")).await.unwrap();
        unit.comments()
            .insert(&NewComment {
                post_id: post.id,
                text: "first".to_string(),
            })
            .await
            .unwrap();
        unit.commit().await.unwrap();

        let stored = store.posts().find_by_id(post.id).await.unwrap();
        assert_eq!(stored.comments_count, 1);
        assert_eq!(store.pool().status().in_use, 0);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let (store, _db) = temp_store().await;
        let coordinator = store.coordinator();

        let mut unit = coordinator.begin().await.unwrap();
        let post = unit.posts().insert(&new_post("gone")).await.unwrap();
        unit.rollback().await.unwrap();

        let err = store.posts().find_by_id(post.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_dropped_unit_is_abandoned() {
        let (store, _db) = temp_store().await;
        let coordinator = store.coordinator();

        let post_id = {
            let mut unit = coordinator.begin().await.unwrap();
            unit.posts().insert(&new_post("abandoned")).await.unwrap().id
        };

        // Discarded connection is closed in the background
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let err = store.posts().find_by_id(post_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(store.pool().status().in_use, 0);
    }

    #[tokio::test]
    async fn test_unit_ids_are_distinct() {
        let (store, _db) = temp_store().await;
        let coordinator = store.coordinator();

        let first = coordinator.begin().await.unwrap();
        let first_id = first.id();
        first.rollback().await.unwrap();

        let second = coordinator.begin().await.unwrap();
        assert_ne!(first_id, second.id());
        second.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_statement_leaves_unit_usable_for_rollback() {
        let (store, _db) = temp_store().await;
        let coordinator = store.coordinator();

        let mut unit = coordinator.begin().await.unwrap();
        let err = unit
            .comments()
            .insert(&NewComment {
                post_id: 999,
                text: "orphan".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConstraintViolation(_)));
        unit.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_after_failed_statement_rolls_back() {
        let (store, _db) = temp_store().await;
        let coordinator = store.coordinator();

        let mut unit = coordinator.begin().await.unwrap();
        let kept = unit.posts().insert(&new_post("before failure")).await.unwrap();
        unit.comments()
            .insert(&NewComment {
                post_id: 999,
                text: "orphan".to_string(),
            })
            .await
            .unwrap_err();

        let err = unit.commit().await.unwrap_err();
        assert!(matches!(err, AppError::TransactionFailed(_)));

        let err = store.posts().find_by_id(kept.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(store.pool().status().in_use, 0);
    }

    #[tokio::test]
    async fn test_rejected_commit_is_rolled_back() {
        let (store, _db) = temp_store().await;
        let coordinator = store.coordinator();

        // Deferred foreign keys push the orphan check to COMMIT itself
        let mut conn = coordinator.pool.acquire().await.unwrap();
        let mut exec = Executor::new(&mut conn, coordinator.ctx.statement_timeout);
        exec.control("BEGIN IMMEDIATE").await.unwrap();
        exec.control("PRAGMA defer_foreign_keys = ON").await.unwrap();
        let mut unit: Box<dyn UnitOfWork> = Box::new(SqliteUnitOfWork {
            id: 42,
            conn,
            state: UnitState::Active,
            failed: false,
            ctx: Arc::clone(&coordinator.ctx),
        });

        let post = unit.posts().insert(&new_post("deferred")).await.unwrap();
        unit.comments()
            .insert(&NewComment {
                post_id: 9999,
                text: "orphan".to_string(),
            })
            .await
            .unwrap();

        let err = unit.commit().await.unwrap_err();
        assert!(matches!(err, AppError::TransactionFailed(_)));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let err = store.posts().find_by_id(post.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(store.pool().status().in_use, 0);
    }
}
