//! Bounded parallel batch runner

use super::tracker::ProgressTracker;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Run `task` over `items` with at most `max_workers` in flight
///
/// Each item is `(id, value)`. The runner records the item's 1-based index
/// and settles its status from the task's result: errors mark it failed,
/// success marks it completed unless the task already settled it (for
/// example as existing). One failing item never stops the others.
///
/// Results are returned in input order.
pub async fn run_parallel<T, R, F, Fut>(
    tracker: Arc<ProgressTracker>,
    items: Vec<(String, T)>,
    max_workers: usize,
    task: F,
) -> Vec<anyhow::Result<R>>
where
    F: Fn(String, T, Arc<ProgressTracker>) -> Fut,
    Fut: Future<Output = anyhow::Result<R>>,
{
    let workers = max_workers.max(1);
    debug!(
        "Running {} over {} items with {} workers",
        tracker.operation(),
        items.len(),
        workers
    );

    let mut results: Vec<(usize, anyhow::Result<R>)> = stream::iter(items.into_iter().enumerate())
        .map(|(position, (id, item))| {
            let tracker = Arc::clone(&tracker);
            tracker.set_index(&id, position + 1);
            let fut = task(id.clone(), item, Arc::clone(&tracker));
            async move {
                let result = fut.await;
                match &result {
                    Ok(_) => {
                        let settled = tracker
                            .status(&id)
                            .is_some_and(|status| status.is_settled());
                        if !settled {
                            tracker.set_completed(&id);
                        }
                    }
                    Err(e) => tracker.set_failed(&id, &format!("{e:#}")),
                }
                (position, result)
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    results.sort_by_key(|(position, _)| *position);
    results.into_iter().map(|(_, result)| result).collect()
}
