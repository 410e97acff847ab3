//! Bounded parallel execution of per-host probes

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

/// Run `probe` for every item with at most `limit` futures in flight.
///
/// Results come back in completion order. A task that panics is logged and
/// dropped; the rest of the batch still completes.
pub(crate) async fn run_bounded<I, T, F, Fut>(items: I, limit: usize, probe: F) -> Vec<T>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks = JoinSet::new();

    for item in items {
        let semaphore = semaphore.clone();
        let fut = probe(item);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            fut.await
        });
    }

    let mut results = Vec::new();
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(value) => results.push(value),
            Err(e) => warn!(error = %e, "Probe task failed"),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_respects_limit() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = run_bounded(0..40u32, 5, |n| {
            let active = active.clone();
            let peak = peak.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                n
            }
        })
        .await;

        assert_eq!(results.len(), 40);
        assert!(peak.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_abort_batch() {
        let mut results = run_bounded(1..=4u32, 2, |n| async move {
            if n == 3 {
                panic!("probe exploded");
            }
            n
        })
        .await;

        results.sort();
        assert_eq!(results, vec![1, 2, 4]);
    }
}
