// Port Layer - Interfaces for external dependencies

pub mod comment_repository;
pub mod post_repository;
pub mod time_provider; // For deterministic testing
pub mod transaction;

// Re-exports
pub use comment_repository::{CommentRepository, CommentRepositoryTx};
pub use post_repository::{PostRepository, PostRepositoryTx};
pub use time_provider::{ManualTimeProvider, SystemTimeProvider, TimeProvider};
pub use transaction::{TransactionCoordinator, UnitOfWork, UnitState};

#[cfg(test)]
pub use comment_repository::MockCommentRepository;
#[cfg(test)]
pub use post_repository::MockPostRepository;
