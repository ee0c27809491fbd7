// SQLite CommentRepository Implementation

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::connection::SqlitePool;
use crate::executor::Executor;
use crate::store::StoreContext;
use blogstore_core::domain::{
    Comment, CommentFilter, CommentId, CommentPatch, NewComment, Page, Pagination,
};
use blogstore_core::error::{AppError, Result};
use blogstore_core::mapper::rows_to_records;
use blogstore_core::mapper::row_to_record;
use blogstore_core::port::CommentRepository;
use blogstore_core::statement::{ParamType, Params, Statement};

const COMMENT_COLUMNS: &str =
    "SELECT id, post_id, text, version, created_at, updated_at FROM comments";

pub(crate) struct CommentStatements {
    select_by_id: Statement,
    exists: Statement,
    count_all: Statement,
    count_for_post: Statement,
    page_all: Statement,
    page_for_post: Statement,
    insert: Statement,
    update: Statement,
    update_versioned: Statement,
    delete: Statement,
}

impl CommentStatements {
    pub(crate) fn prepare() -> Result<Self> {
        use ParamType as P;

        Ok(Self {
            select_by_id: Statement::new(format!("{} WHERE id = ?", COMMENT_COLUMNS), &[P::INTEGER])?,
            exists: Statement::new("SELECT COUNT(*) FROM comments WHERE id = ?", &[P::INTEGER])?,
            count_all: Statement::new("SELECT COUNT(*) FROM comments", &[])?,
            count_for_post: Statement::new(
                "SELECT COUNT(*) FROM comments WHERE post_id = ?",
                &[P::INTEGER],
            )?,
            page_all: Statement::new(
                format!(
                    "{} ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
                    COMMENT_COLUMNS
                ),
                &[P::INTEGER, P::INTEGER],
            )?,
            page_for_post: Statement::new(
                format!(
                    "{} WHERE post_id = ? ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
                    COMMENT_COLUMNS
                ),
                &[P::INTEGER, P::INTEGER, P::INTEGER],
            )?,
            insert: Statement::new(
                r#"
                INSERT INTO comments (post_id, text, version, created_at, updated_at)
                VALUES (?, ?, 1, ?, ?)
                "#,
                &[P::INTEGER, P::TEXT, P::TIMESTAMP, P::TIMESTAMP],
            )?,
            update: Statement::new(
                "UPDATE comments SET text = ?, version = version + 1, updated_at = ? WHERE id = ?",
                &[P::TEXT, P::TIMESTAMP, P::INTEGER],
            )?,
            update_versioned: Statement::new(
                r#"
                UPDATE comments SET text = ?, version = version + 1, updated_at = ?
                WHERE id = ? AND version = ?
                "#,
                &[P::TEXT, P::TIMESTAMP, P::INTEGER, P::INTEGER],
            )?,
            delete: Statement::new("DELETE FROM comments WHERE id = ?", &[P::INTEGER])?,
        })
    }
}

pub(crate) async fn find_by_id(
    exec: &mut Executor<'_>,
    ctx: &StoreContext,
    id: CommentId,
) -> Result<Comment> {
    let row = exec
        .fetch_optional(&ctx.comments.select_by_id, &Params::new().with(id))
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(row_to_record(&row)?)
}

pub(crate) async fn find_all(
    exec: &mut Executor<'_>,
    ctx: &StoreContext,
    filter: CommentFilter,
    pagination: Pagination,
) -> Result<Page<Comment>> {
    pagination.validate()?;
    let stmts = &ctx.comments;

    let (count, page, mut params) = match filter.post_id {
        Some(post_id) => (
            &stmts.count_for_post,
            &stmts.page_for_post,
            Params::new().with(post_id),
        ),
        None => (&stmts.count_all, &stmts.page_all, Params::new()),
    };

    let total = exec.fetch_i64(count, &params).await?;
    if total == 0 {
        return Ok(Page::empty(pagination));
    }

    params.push(pagination.limit());
    params.push(pagination.offset());
    let rows = exec.fetch_all(page, &params).await?;
    Ok(Page::new(rows_to_records(&rows)?, pagination, total))
}

pub(crate) async fn insert(
    exec: &mut Executor<'_>,
    ctx: &StoreContext,
    comment: &NewComment,
) -> Result<Comment> {
    let now = ctx.clock.now();
    let done = exec
        .execute(
            &ctx.comments.insert,
            &Params::new()
                .with(comment.post_id)
                .with(comment.text.as_str())
                .with(now)
                .with(now),
        )
        .await
        .map_err(|err| match err {
            AppError::ConstraintViolation(_) => AppError::ConstraintViolation(format!(
                "post {} does not exist",
                comment.post_id
            )),
            other => other,
        })?;

    debug!(comment_id = done.last_insert_id, post_id = comment.post_id, "comment inserted");
    find_by_id(exec, ctx, done.last_insert_id).await
}

pub(crate) async fn update(
    exec: &mut Executor<'_>,
    ctx: &StoreContext,
    id: CommentId,
    patch: &CommentPatch,
) -> Result<Comment> {
    let stmts = &ctx.comments;
    let mut params = Params::new()
        .with(patch.text.as_str())
        .with(ctx.clock.now())
        .with(id);

    let stmt = match patch.expected_version {
        Some(version) => {
            params.push(version);
            &stmts.update_versioned
        }
        None => &stmts.update,
    };

    let done = exec.execute(stmt, &params).await?;
    if done.rows_affected == 0 {
        let exists = exec.fetch_i64(&stmts.exists, &Params::new().with(id)).await? > 0;
        return Err(if exists {
            AppError::OptimisticConflict(format!(
                "comment {} was modified concurrently (expected version {})",
                id,
                patch.expected_version.unwrap_or_default()
            ))
        } else {
            not_found(id)
        });
    }

    find_by_id(exec, ctx, id).await
}

pub(crate) async fn delete(exec: &mut Executor<'_>, ctx: &StoreContext, id: CommentId) -> Result<()> {
    let done = exec
        .execute(&ctx.comments.delete, &Params::new().with(id))
        .await?;
    if done.rows_affected == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

fn not_found(id: CommentId) -> AppError {
    AppError::NotFound(format!("comment {}", id))
}

/// Comment repository over the shared pool
#[derive(Clone)]
pub struct SqliteCommentRepository {
    pool: SqlitePool,
    ctx: Arc<StoreContext>,
}

impl SqliteCommentRepository {
    pub(crate) fn new(pool: SqlitePool, ctx: Arc<StoreContext>) -> Self {
        Self { pool, ctx }
    }
}

#[async_trait]
impl CommentRepository for SqliteCommentRepository {
    async fn find_by_id(&self, id: CommentId) -> Result<Comment> {
        let mut conn = self.pool.acquire().await?;
        let mut exec = Executor::new(&mut conn, self.ctx.statement_timeout);
        find_by_id(&mut exec, &self.ctx, id).await
    }

    async fn find_all(
        &self,
        filter: CommentFilter,
        pagination: Pagination,
    ) -> Result<Page<Comment>> {
        let mut conn = self.pool.acquire().await?;
        let mut exec = Executor::new(&mut conn, self.ctx.statement_timeout);
        find_all(&mut exec, &self.ctx, filter, pagination).await
    }

    async fn insert(&self, comment: &NewComment) -> Result<Comment> {
        let mut conn = self.pool.acquire().await?;
        let mut exec = Executor::new(&mut conn, self.ctx.statement_timeout);
        insert(&mut exec, &self.ctx, comment).await
    }

    async fn update(&self, id: CommentId, patch: &CommentPatch) -> Result<Comment> {
        let mut conn = self.pool.acquire().await?;
        let mut exec = Executor::new(&mut conn, self.ctx.statement_timeout);
        update(&mut exec, &self.ctx, id, patch).await
    }

    async fn delete(&self, id: CommentId) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let mut exec = Executor::new(&mut conn, self.ctx.statement_timeout);
        delete(&mut exec, &self.ctx, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_statements_prepare() {
        let stmts = CommentStatements::prepare().unwrap();
        assert_eq!(stmts.page_for_post.param_types().len(), 3);
    }
}
