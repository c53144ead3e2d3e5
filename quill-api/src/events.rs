//! Lifespan events.

use std::fmt;
use std::sync::Arc;

use quill::{async_trait, BoxError, Event, SharedState};
use tokio::sync::Semaphore;
use tokio::task::JoinError;

/// A bounded pool for CPU-bound work.
///
/// At most `workers` closures run at once, each on tokio's blocking
/// threads.
#[derive(Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run a closure on the pool, waiting for a free worker.
    pub async fn run<F, T>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PoolError::Closed)?;

        tokio::task::spawn_blocking(f).await.map_err(PoolError::Join)
    }

    /// Wait for running work to finish and refuse new work.
    pub async fn close(&self) {
        let workers = u32::try_from(self.workers).unwrap_or(u32::MAX);
        let drained = self.permits.acquire_many(workers).await;
        self.permits.close();
        drop(drained);
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

#[derive(Debug)]
pub enum PoolError {
    Closed,
    Join(JoinError),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Closed => write!(f, "worker pool is closed"),
            PoolError::Join(err) => write!(f, "worker task failed: {}", err),
        }
    }
}

impl std::error::Error for PoolError {}

/// Starts a [`WorkerPool`] under the name `worker_pool`.
pub struct WorkerPoolEvent {
    workers: usize,
}

impl WorkerPoolEvent {
    pub const NAME: &'static str = "worker_pool";

    pub fn new(workers: usize) -> Self {
        Self { workers }
    }
}

#[async_trait]
impl Event for WorkerPoolEvent {
    type Instance = WorkerPool;

    fn name(&self) -> &str {
        Self::NAME
    }

    async fn startup(&self, _: &SharedState) -> Result<WorkerPool, BoxError> {
        tracing::info!(workers = self.workers, "starting worker pool");
        Ok(WorkerPool::new(self.workers))
    }

    async fn shutdown(&self, pool: &WorkerPool) -> Result<(), BoxError> {
        pool.close().await;
        Ok(())
    }
}
