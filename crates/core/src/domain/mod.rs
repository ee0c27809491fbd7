// Domain Layer - Records and value types of the blog store

pub mod comment;
pub mod page;
pub mod post;

// Re-exports
pub use comment::{Comment, CommentFilter, CommentId, CommentPatch, NewComment, COMMENT_SCHEMA};
pub use page::{Page, Pagination};
pub use post::{
    normalize_tags, NewPost, Post, PostFilter, PostId, PostOrder, PostPatch, POST_SCHEMA,
};
