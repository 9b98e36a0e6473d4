//! Bounded, index-preserving fan-out over async work.

use futures::{
    future::Future,
    stream::{self, StreamExt},
};

/// Run `f` over every item with at most `limit` futures in flight.
///
/// Completion order is arbitrary; the returned vector is aligned with `items`.
pub async fn map_bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, f: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let total = items.len();
    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();

    let mut completed = stream::iter(items.into_iter().enumerate())
        .map(|(idx, item)| {
            let fut = f(item);
            async move { (idx, fut.await) }
        })
        .buffer_unordered(limit.max(1));

    while let Some((idx, result)) = completed.next().await {
        slots[idx] = Some(result);
    }

    // buffer_unordered drives every future to completion, so every slot is filled
    slots.into_iter().flatten().collect()
}
