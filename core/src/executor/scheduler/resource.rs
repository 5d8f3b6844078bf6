use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::SchedulerError;

/// Concurrency limiter handed to the parallel scheduler.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Waits for a free slot. Returns `AcquireCanceled` as soon as `cancel`
    /// fires so a stalled wait never blocks shutdown.
    async fn acquire(&self, cancel: &CancellationToken) -> Result<ResourceGuard, SchedulerError>;
}

/// Holds a slot until dropped.
#[derive(Debug)]
pub struct ResourceGuard {
    _permit: Option<OwnedSemaphorePermit>,
}

/// At most `limit` holders at a time.
#[derive(Debug, Clone)]
pub struct Bounded {
    sem: Arc<Semaphore>,
    limit: usize,
}

impl Bounded {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            sem: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }
}

#[async_trait]
impl Resource for Bounded {
    async fn acquire(&self, cancel: &CancellationToken) -> Result<ResourceGuard, SchedulerError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SchedulerError::AcquireCanceled),
            permit = self.sem.clone().acquire_owned() => {
                let permit = permit.map_err(|_| SchedulerError::LimiterClosed)?;
                Ok(ResourceGuard { _permit: Some(permit) })
            }
        }
    }
}

/// Never blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

#[async_trait]
impl Resource for Unbounded {
    async fn acquire(&self, _cancel: &CancellationToken) -> Result<ResourceGuard, SchedulerError> {
        Ok(ResourceGuard { _permit: None })
    }
}
