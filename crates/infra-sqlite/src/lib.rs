// blogstore Infrastructure - SQLite Adapter
// Implements: connection pool, PostRepository, CommentRepository, TransactionCoordinator

mod comment_repository;
mod connection;
mod executor;
mod migration;
mod pool;
mod post_repository;
mod schema_check;
mod store;
mod transaction;

#[cfg(test)]
mod test_support;

pub use comment_repository::SqliteCommentRepository;
pub use connection::{create_pool, SqliteConnector, SqlitePool, SqlitePooledConnection};
pub use executor::{Done, Executor};
pub use migration::run_migrations;
pub use pool::{
    ConnectionPool, ManageConnection, PoolConfig, PoolMetrics, PoolStatus, PooledConnection,
};
pub use post_repository::SqlitePostRepository;
pub use schema_check::verify_schemas;
pub use store::SqliteStore;
pub use transaction::{SqliteTransactionCoordinator, SqliteUnitOfWork};

// sqlx errors are translated by executor::map_sqlx_error (orphan rules forbid
// From<sqlx::Error> for AppError in this crate)
