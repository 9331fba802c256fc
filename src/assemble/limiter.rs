//! Bounded-concurrency fan-out.
//!
//! Part fetches are I/O-heavy and each decoded part holds megabytes of
//! pixels, so at most `max_concurrent` run at once. Results come back in
//! input order regardless of completion order.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

/// Run `f` over `items` with at most `max_concurrent` futures in flight.
/// The output vector is in input order.
pub async fn map_ordered<T, U, F, Fut>(items: Vec<T>, max_concurrent: usize, f: F) -> Vec<U>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = U>,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let futures = items.into_iter().map(|item| {
        let semaphore = Arc::clone(&semaphore);
        let fut = f(item);
        async move {
            // Semaphore is never closed while we hold an Arc to it.
            let _permit = semaphore.acquire().await;
            fut.await
        }
    });
    join_all(futures).await
}
