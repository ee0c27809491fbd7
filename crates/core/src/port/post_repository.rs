// Post Repository Port (Interface)

use crate::domain::{NewPost, Page, Pagination, Post, PostFilter, PostId, PostPatch};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Post persistence
///
/// Each call runs on its own pooled connection. Use [`PostRepositoryTx`] through a
/// [`UnitOfWork`](super::UnitOfWork) to group several calls atomically.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Find post by ID (`NotFound` when absent)
    async fn find_by_id(&self, id: PostId) -> Result<Post>;

    /// Filtered, ordered page of posts plus the total match count
    async fn find_all(&self, filter: &PostFilter, pagination: Pagination) -> Result<Page<Post>>;

    /// Insert a new post; returns it with its assigned id and version 1
    async fn insert(&self, post: &NewPost) -> Result<Post>;

    /// Replace title, text and tags
    ///
    /// `NotFound` when the id is absent, `OptimisticConflict` when
    /// `patch.expected_version` no longer matches.
    async fn update(&self, id: PostId, patch: &PostPatch) -> Result<Post>;

    /// Delete post with its comments and tag links; `NotFound` if already gone
    async fn delete(&self, id: PostId) -> Result<()>;

    /// Atomically increment the like counter
    async fn add_like(&self, id: PostId) -> Result<Post>;
}

/// Post operations on the connection of an open unit of work
#[async_trait]
pub trait PostRepositoryTx: Send {
    async fn find_by_id(&mut self, id: PostId) -> Result<Post>;

    async fn find_all(&mut self, filter: &PostFilter, pagination: Pagination)
        -> Result<Page<Post>>;

    async fn insert(&mut self, post: &NewPost) -> Result<Post>;

    async fn update(&mut self, id: PostId, patch: &PostPatch) -> Result<Post>;

    async fn delete(&mut self, id: PostId) -> Result<()>;

    async fn add_like(&mut self, id: PostId) -> Result<Post>;
}
