// Application Layer - Request handling boundary and unit-of-work helpers

pub mod comments;
pub mod cursor;
pub mod posts;
pub mod reply;
pub mod transactional;

// Re-exports
pub use comments::{CommentService, CreateCommentRequest, UpdateCommentRequest};
pub use cursor::{CommentQuery, PageCursor, PagedQuery, PostQuery};
pub use posts::{CreatePostRequest, ListPostsRequest, PostService, UpdatePostRequest};
pub use reply::{decode, reply, reply_empty, Failure, Reply};
pub use transactional::transactional;
