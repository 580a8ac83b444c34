// ============================================================================
// File: packages/vmhost/src/async_task.rs
// ----------------------------------------------------------------------------
// AsyncTask handle used at every remote-service seam.
//
// Trait methods that talk to the external VM service return an AsyncTask
// (a spawned tokio task) instead of being `async fn`, which keeps the
// service traits object-safe.
// ============================================================================

use std::future::Future;

/// Handle to a spawned unit of remote work
pub type AsyncTask<T> = tokio::task::JoinHandle<T>;

/// Builder that turns a future into an [`AsyncTask`]
pub struct AsyncTaskBuilder<F> {
    future: F,
}

impl<F> AsyncTaskBuilder<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    /// Wrap a future for spawning
    pub fn new(future: F) -> Self {
        Self { future }
    }

    /// Spawn the future on the current tokio runtime
    pub fn spawn(self) -> AsyncTask<F::Output> {
        tokio::spawn(self.future)
    }
}
