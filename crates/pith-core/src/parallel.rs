//! Bounded-concurrency mapping over a sequence.
//!
//! `parallel_map` is the only place the pipeline awaits many futures at
//! once. Workers pull indices from a shared cursor so at most `concurrency`
//! invocations are in flight; result slot `i` always corresponds to input
//! `i` regardless of completion order, while the progress callback fires in
//! completion order, exactly once per finished item.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Progress callback: `(completed, total)`.
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Per-item failure record produced under `continue_on_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub index: usize,
    pub message: String,
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item {}: {}", self.index, self.message)
    }
}

/// Options for `parallel_map`.
pub struct MapOptions {
    /// Maximum invocations in flight.
    pub concurrency: usize,
    /// When true (the default), a failing item is recorded as an `ItemError`
    /// and mapping continues. When false, the first error cancels further
    /// work (in-flight items finish, no new items start) and the whole call
    /// returns that error.
    pub continue_on_error: bool,
    /// Fires after each item finishes, in completion order.
    pub on_progress: Option<ProgressFn>,
}

impl MapOptions {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            continue_on_error: true,
            on_progress: None,
        }
    }

    pub fn with_progress<P>(mut self, progress: P) -> Self
    where
        P: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(progress));
        self
    }

    pub fn fail_fast(mut self) -> Self {
        self.continue_on_error = false;
        self
    }
}

impl Default for MapOptions {
    fn default() -> Self {
        Self::new(4)
    }
}

/// Map `f` over `items` with bounded concurrency.
///
/// Returns one slot per input index: `Ok(value)` or `Err(ItemError)` when
/// `continue_on_error` is set. With `fail_fast`, the first error is returned
/// as the call's own error instead.
pub async fn parallel_map<'a, T, R, F, Fut>(
    items: &'a [T],
    f: F,
    opts: MapOptions,
) -> Result<Vec<std::result::Result<R, ItemError>>>
where
    T: Sync,
    R: Send,
    F: Fn(&'a T, usize) -> Fut + Sync,
    Fut: Future<Output = Result<R>> + Send + 'a,
{
    let total = items.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let concurrency = opts.concurrency.clamp(1, total);
    let cursor = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);
    let aborted = AtomicBool::new(false);
    let slots: Vec<Mutex<Option<std::result::Result<R, ItemError>>>> =
        (0..total).map(|_| Mutex::new(None)).collect();
    let first_error: Mutex<Option<Error>> = Mutex::new(None);

    let workers = (0..concurrency).map(|_| async {
        loop {
            if !opts.continue_on_error && aborted.load(Ordering::SeqCst) {
                break;
            }
            let i = cursor.fetch_add(1, Ordering::SeqCst);
            if i >= total {
                break;
            }

            let outcome = f(&items[i], i).await;
            let stop = match outcome {
                Ok(value) => {
                    *slots[i].lock().expect("slot lock") = Some(Ok(value));
                    false
                }
                Err(e) if opts.continue_on_error => {
                    *slots[i].lock().expect("slot lock") = Some(Err(ItemError {
                        index: i,
                        message: e.to_string(),
                    }));
                    false
                }
                Err(e) => {
                    aborted.store(true, Ordering::SeqCst);
                    let mut first = first_error.lock().expect("error lock");
                    if first.is_none() {
                        *first = Some(e);
                    }
                    true
                }
            };

            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(progress) = &opts.on_progress {
                progress(done, total);
            }
            if stop {
                break;
            }
        }
    });

    futures::future::join_all(workers).await;

    if let Some(e) = first_error.into_inner().expect("error lock") {
        return Err(e);
    }

    Ok(slots
        .into_iter()
        .map(|slot| {
            slot.into_inner()
                .expect("slot lock")
                .expect("every slot is filled when no cancellation occurred")
        })
        .collect())
}

/// Chunk `items` into groups of `batch_size`, then `parallel_map` over the
/// groups. `f` receives each batch slice and its batch index.
pub async fn parallel_batch<'a, T, R, F, Fut>(
    items: &'a [T],
    batch_size: usize,
    f: F,
    opts: MapOptions,
) -> Result<Vec<std::result::Result<R, ItemError>>>
where
    T: Sync,
    R: Send,
    F: Fn(&'a [T], usize) -> Fut + Sync,
    Fut: Future<Output = Result<R>> + Send + 'a,
{
    let batches: Vec<&'a [T]> = items.chunks(batch_size.max(1)).collect();
    parallel_map(&batches, |batch, i| f(*batch, i), opts).await
}
