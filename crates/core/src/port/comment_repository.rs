// Comment Repository Port (Interface)

use crate::domain::{Comment, CommentFilter, CommentId, CommentPatch, NewComment, Page, Pagination};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Comment persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Find comment by ID (`NotFound` when absent)
    async fn find_by_id(&self, id: CommentId) -> Result<Comment>;

    /// Comments oldest first, optionally restricted to one post
    async fn find_all(&self, filter: CommentFilter, pagination: Pagination)
        -> Result<Page<Comment>>;

    /// Insert a comment; `ConstraintViolation` when the post does not exist
    async fn insert(&self, comment: &NewComment) -> Result<Comment>;

    async fn update(&self, id: CommentId, patch: &CommentPatch) -> Result<Comment>;

    async fn delete(&self, id: CommentId) -> Result<()>;
}

/// Comment operations on the connection of an open unit of work
#[async_trait]
pub trait CommentRepositoryTx: Send {
    async fn find_by_id(&mut self, id: CommentId) -> Result<Comment>;

    async fn find_all(
        &mut self,
        filter: CommentFilter,
        pagination: Pagination,
    ) -> Result<Page<Comment>>;

    async fn insert(&mut self, comment: &NewComment) -> Result<Comment>;

    async fn update(&mut self, id: CommentId, patch: &CommentPatch) -> Result<Comment>;

    async fn delete(&mut self, id: CommentId) -> Result<()>;
}
