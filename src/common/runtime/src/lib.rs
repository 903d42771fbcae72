//! Async runtime utilities for scella.
//!
//! Two concerns live here: the loader's prefetch workers (tracked through
//! [`JoinSet`]) and a sync bridge for callers that drive realization from
//! blocking code.

use std::future::Future;

use common_error::{ScellaError, ScellaResult};

/// Drive a future to completion from synchronous code.
///
/// Builds a throwaway current-thread runtime with the time driver
/// enabled, which extraction retries need for their backoff sleeps.
/// Must not be called from inside an async context.
pub fn block_on<F: Future>(future: F) -> ScellaResult<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| ScellaError::internal(format!("failed to build runtime: {e}")))?;
    Ok(runtime.block_on(future))
}

/// Tracks the loader's prefetch workers so they can be awaited on
/// shutdown. Remaining tasks are aborted when the set drops.
pub struct JoinSet<T> {
    inner: tokio::task::JoinSet<T>,
}

impl<T: Send + 'static> JoinSet<T> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            inner: tokio::task::JoinSet::new(),
        }
    }

    /// Spawn a task into the set.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.inner.spawn(future);
    }

    /// Wait for the next task to finish; `None` once the set is drained.
    pub async fn join_next(&mut self) -> Option<Result<T, tokio::task::JoinError>> {
        self.inner.join_next().await
    }
}

impl<T: Send + 'static> Default for JoinSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
