// Post Service - request handling for posts

pub mod request;

pub use request::{CreatePostRequest, ListPostsRequest, UpdatePostRequest};

use std::sync::Arc;
use tracing::info;

use super::cursor::{PageCursor, PostQuery};
use crate::domain::{Page, Post, PostFilter, PostId};
use crate::error::Result;
use crate::port::PostRepository;

pub struct PostService {
    posts: Arc<dyn PostRepository>,
}

impl PostService {
    pub fn new(posts: Arc<dyn PostRepository>) -> Self {
        Self { posts }
    }

    pub async fn list(&self, req: ListPostsRequest) -> Result<Page<Post>> {
        let (filter, pagination) = req.into_query()?;
        self.posts.find_all(&filter, pagination).await
    }

    pub async fn get(&self, id: PostId) -> Result<Post> {
        self.posts.find_by_id(id).await
    }

    pub async fn create(&self, req: CreatePostRequest) -> Result<Post> {
        let new_post = req.into_new_post()?;
        let post = self.posts.insert(&new_post).await?;
        info!(post_id = post.id, tags = post.tags.len(), "Post created");
        Ok(post)
    }

    pub async fn update(&self, id: PostId, req: UpdatePostRequest) -> Result<Post> {
        let patch = req.into_patch()?;
        let post = self.posts.update(id, &patch).await?;
        info!(post_id = id, version = post.version, "Post updated");
        Ok(post)
    }

    pub async fn delete(&self, id: PostId) -> Result<()> {
        self.posts.delete(id).await?;
        info!(post_id = id, "Post deleted");
        Ok(())
    }

    pub async fn like(&self, id: PostId) -> Result<Post> {
        self.posts.add_like(id).await
    }

    /// Walk every post matching `search`, one page per call
    pub fn cursor(&self, search: &str, page_size: u32) -> Result<PageCursor<PostQuery<'_>>> {
        PageCursor::new(
            PostQuery {
                repo: self.posts.as_ref(),
                filter: PostFilter::parse(search),
            },
            page_size,
        )
    }
}
