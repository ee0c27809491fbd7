// Comment Service - request handling for comments of one post

pub mod request;

pub use request::{CreateCommentRequest, UpdateCommentRequest};

use std::sync::Arc;
use tracing::info;

use super::cursor::{CommentQuery, PageCursor};
use super::transactional::transactional;
use crate::domain::{Comment, CommentFilter, CommentId, Page, Pagination, PostId};
use crate::error::{AppError, Result};
use crate::port::{CommentRepository, PostRepository, TransactionCoordinator, UnitOfWork};

/// Comments are always addressed through their post; a comment reached
/// through the wrong post is reported as `NotFound`.
pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
    coordinator: Arc<dyn TransactionCoordinator>,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        posts: Arc<dyn PostRepository>,
        coordinator: Arc<dyn TransactionCoordinator>,
    ) -> Self {
        Self {
            comments,
            posts,
            coordinator,
        }
    }

    pub async fn list(&self, post_id: PostId, pagination: Pagination) -> Result<Page<Comment>> {
        pagination.validate()?;
        // Distinguish "no comments" from "no such post"
        self.posts.find_by_id(post_id).await?;
        self.comments
            .find_all(CommentFilter::for_post(post_id), pagination)
            .await
    }

    pub async fn get(&self, post_id: PostId, comment_id: CommentId) -> Result<Comment> {
        let comment = self.comments.find_by_id(comment_id).await?;
        ensure_belongs(&comment, post_id)?;
        Ok(comment)
    }

    pub async fn create(&self, post_id: PostId, req: CreateCommentRequest) -> Result<Comment> {
        let new_comment = req.into_new_comment(post_id)?;
        let comment = transactional(self.coordinator.as_ref(), move |unit| {
            Box::pin(async move {
                unit.posts().find_by_id(new_comment.post_id).await?;
                unit.comments().insert(&new_comment).await
            })
        })
        .await?;
        info!(post_id, comment_id = comment.id, "Comment created");
        Ok(comment)
    }

    pub async fn update(
        &self,
        post_id: PostId,
        comment_id: CommentId,
        req: UpdateCommentRequest,
    ) -> Result<Comment> {
        let patch = req.into_patch()?;
        transactional(self.coordinator.as_ref(), move |unit| {
            Box::pin(async move {
                load_owned(unit, post_id, comment_id).await?;
                unit.comments().update(comment_id, &patch).await
            })
        })
        .await
    }

    pub async fn delete(&self, post_id: PostId, comment_id: CommentId) -> Result<()> {
        transactional(self.coordinator.as_ref(), move |unit| {
            Box::pin(async move {
                load_owned(unit, post_id, comment_id).await?;
                unit.comments().delete(comment_id).await
            })
        })
        .await?;
        info!(post_id, comment_id, "Comment deleted");
        Ok(())
    }

    pub fn cursor(&self, post_id: PostId, page_size: u32) -> Result<PageCursor<CommentQuery<'_>>> {
        PageCursor::new(
            CommentQuery {
                repo: self.comments.as_ref(),
                filter: CommentFilter::for_post(post_id),
            },
            page_size,
        )
    }
}

async fn load_owned(
    unit: &mut Box<dyn UnitOfWork>,
    post_id: PostId,
    comment_id: CommentId,
) -> Result<Comment> {
    let comment = unit.comments().find_by_id(comment_id).await?;
    ensure_belongs(&comment, post_id)?;
    Ok(comment)
}

fn ensure_belongs(comment: &Comment, post_id: PostId) -> Result<()> {
    if comment.post_id != post_id {
        return Err(AppError::NotFound(format!(
            "comment {} on post {}",
            comment.id, post_id
        )));
    }
    Ok(())
}
