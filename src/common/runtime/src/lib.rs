//! Async runtime utilities for sift.
//!
//! Provides [`LookupPool`], the request-scoped worker pool used by index
//! expansion. A pool owns its own tokio runtime, bounds how many submitted
//! tasks run at once, and tears everything down when it is dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common_error::{SiftError, SiftResult};
use log::debug;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// A bounded worker pool scoped to a single call.
///
/// Tasks are queued without limit but at most `threads` of them run at the
/// same time. Dropping the pool (or calling [`LookupPool::shutdown`])
/// cancels everything still outstanding.
///
/// Blocking calls made from inside another tokio runtime's async context
/// are rejected with an error.
pub struct LookupPool {
    runtime: Option<Runtime>,
    permits: Arc<Semaphore>,
    threads: usize,
}

impl LookupPool {
    /// Create a pool with `max(threads, 1)` workers.
    pub fn new(name: &str, threads: usize) -> SiftResult<Self> {
        let threads = threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name(format!("{name}-worker"))
            .enable_time()
            .build()
            .map_err(|e| SiftError::internal(format!("Failed to create lookup pool: {e}")))?;

        debug!("Started lookup pool '{name}' with {threads} workers");

        Ok(Self {
            runtime: Some(runtime),
            permits: Arc::new(Semaphore::new(threads)),
            threads,
        })
    }

    /// Number of tasks allowed to run concurrently.
    pub fn threads(&self) -> usize {
        self.threads
    }

    fn runtime(&self) -> SiftResult<&Runtime> {
        self.runtime
            .as_ref()
            .ok_or_else(|| SiftError::internal("lookup pool already shut down"))
    }

    // Blocking from a runtime worker would panic inside tokio.
    fn blocking_runtime(&self) -> SiftResult<&Runtime> {
        if Handle::try_current().is_ok() {
            return Err(SiftError::internal(
                "lookup pool cannot block from inside an async context",
            ));
        }
        self.runtime()
    }

    /// Submit a task. Never blocks; the task waits for a free worker slot.
    pub fn spawn<F>(&self, future: F) -> SiftResult<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        Ok(self.runtime()?.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            future.await
        }))
    }

    /// Block the calling thread on a future driven by this pool.
    ///
    /// Fails when called from inside an async context.
    pub fn block_on<F: Future>(&self, future: F) -> SiftResult<F::Output> {
        Ok(self.blocking_runtime()?.block_on(future))
    }

    /// Block on a future, giving up after `timeout`.
    ///
    /// Returns `Ok(None)` when the timeout elapsed first.
    pub fn block_on_timeout<F: Future>(
        &self,
        future: F,
        timeout: Duration,
    ) -> SiftResult<Option<F::Output>> {
        let runtime = self.blocking_runtime()?;
        Ok(runtime.block_on(async { tokio::time::timeout(timeout, future).await.ok() }))
    }

    /// Shut the pool down, cancelling outstanding tasks.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            self.permits.close();
            runtime.shutdown_background();
            debug!("Lookup pool shut down");
        }
    }
}

impl Drop for LookupPool {
    fn drop(&mut self) {
        self.stop();
    }
}
