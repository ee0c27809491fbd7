// Transaction port for atomic operations

use super::{CommentRepositoryTx, PostRepositoryTx};
use crate::error::Result;
use async_trait::async_trait;

/// Lifecycle of a unit of work; exactly one terminal transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Active,
    Committed,
    RolledBack,
}

/// Transaction boundary over one borrowed connection
///
/// Every repository call made through a unit runs on that same connection.
/// Dropping a unit that is still `Active` abandons it: the connection is
/// discarded and the store rolls the transaction back.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Identifier used in log events
    fn id(&self) -> u64;

    fn state(&self) -> UnitState;

    fn posts(&mut self) -> &mut dyn PostRepositoryTx;

    fn comments(&mut self) -> &mut dyn CommentRepositoryTx;

    /// Commit; on failure the unit is rolled back and `TransactionFailed` returned
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Roll back and release the connection
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Opens units of work
#[async_trait]
pub trait TransactionCoordinator: Send + Sync {
    /// Acquire a connection and start a write transaction on it
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}
