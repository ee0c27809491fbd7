// Lazy, restartable page-by-page iteration over repository listings

use async_trait::async_trait;

use crate::domain::{Comment, CommentFilter, Page, Pagination, Post, PostFilter};
use crate::error::Result;
use crate::port::{CommentRepository, PostRepository};

/// A listing that can be fetched one page at a time
#[async_trait]
pub trait PagedQuery: Send + Sync {
    type Item: Send;

    async fn fetch(&self, pagination: Pagination) -> Result<Page<Self::Item>>;
}

pub struct PostQuery<'r> {
    pub repo: &'r dyn PostRepository,
    pub filter: PostFilter,
}

#[async_trait]
impl PagedQuery for PostQuery<'_> {
    type Item = Post;

    async fn fetch(&self, pagination: Pagination) -> Result<Page<Post>> {
        self.repo.find_all(&self.filter, pagination).await
    }
}

pub struct CommentQuery<'r> {
    pub repo: &'r dyn CommentRepository,
    pub filter: CommentFilter,
}

#[async_trait]
impl PagedQuery for CommentQuery<'_> {
    type Item = Comment;

    async fn fetch(&self, pagination: Pagination) -> Result<Page<Comment>> {
        self.repo.find_all(self.filter, pagination).await
    }
}

/// Fetches pages only when asked; nothing is read ahead
///
/// Each page is a fresh query, so rows inserted or deleted between calls can
/// shift page boundaries. Call [`rewind`](Self::rewind) to start over.
pub struct PageCursor<Q> {
    query: Q,
    first: Pagination,
    next: Option<Pagination>,
}

impl<Q: PagedQuery> PageCursor<Q> {
    pub fn new(query: Q, page_size: u32) -> Result<Self> {
        let first = Pagination::new(1, page_size)?;
        Ok(Self {
            query,
            first,
            next: Some(first),
        })
    }

    /// Next non-empty page of items, or `None` once the listing is exhausted
    pub async fn next_page(&mut self) -> Result<Option<Vec<Q::Item>>> {
        let Some(pagination) = self.next else {
            return Ok(None);
        };

        let page = self.query.fetch(pagination).await?;
        self.next = page.has_next.then(|| pagination.next());

        if page.items.is_empty() {
            self.next = None;
            return Ok(None);
        }
        Ok(Some(page.items))
    }

    pub fn rewind(&mut self) {
        self.next = Some(self.first);
    }

    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }

    /// Drain the remaining pages
    pub async fn collect_remaining(&mut self) -> Result<Vec<Q::Item>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page);
        }
        Ok(items)
    }
}
