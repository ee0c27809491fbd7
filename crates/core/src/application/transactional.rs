// Run a closure inside a unit of work

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::Result;
use crate::port::{TransactionCoordinator, UnitOfWork};

/// Begin a unit, run `work` on it, commit on `Ok` and roll back on `Err`.
///
/// The work is never retried: once a statement may have mutated state, the
/// failure goes back to the caller, who decides whether to run the whole unit again.
///
/// ```text
/// let post = transactional(coordinator, move |unit| Box::pin(async move {
///     let post = unit.posts().insert(&new_post).await?;
///     unit.comments().insert(&NewComment { post_id: post.id, text }).await?;
///     Ok(post)
/// })).await?;
/// ```
pub async fn transactional<T, F>(coordinator: &dyn TransactionCoordinator, work: F) -> Result<T>
where
    T: Send,
    F: for<'u> FnOnce(&'u mut Box<dyn UnitOfWork>) -> BoxFuture<'u, Result<T>> + Send,
{
    let mut unit = coordinator.begin().await?;
    let unit_id = unit.id();

    let outcome = work(&mut unit).await;
    match outcome {
        Ok(value) => {
            unit.commit().await?;
            debug!(unit_id, "Unit of work committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = unit.rollback().await {
                warn!(
                    unit_id,
                    error = %rollback_err,
                    "Rollback after failed unit of work also failed"
                );
            }
            debug!(unit_id, error = %err, "Unit of work rolled back");
            Err(err)
        }
    }
}
