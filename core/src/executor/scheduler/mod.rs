//! Strategies that walk an execution DAG and drive a per-node callback.

pub mod parallel;
pub mod resource;
pub mod sequential;

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::dag::Dag;

pub use parallel::Parallel;
pub use resource::{Bounded, Resource, ResourceGuard, Unbounded};
pub use sequential::Sequential;

/// Either strategy, chosen by the requested parallelism.
pub enum Scheduler<V> {
    Sequential(Sequential<V>),
    Parallel(Parallel<V>),
}

impl<V: Clone> Scheduler<V> {
    /// `parallel > 1` selects the parallel strategy bounded to that many
    /// concurrent visits; anything else walks the DAG sequentially.
    pub fn new(dag: Dag<V>, parallel: usize, reverse: bool, cancel: CancellationToken) -> Self {
        if parallel > 1 {
            Self::Parallel(Parallel::new(
                dag,
                reverse,
                Arc::new(Bounded::new(parallel)),
                cancel,
            ))
        } else {
            Self::Sequential(Sequential::new(dag, reverse))
        }
    }

    pub async fn run<F, Fut, E>(&self, visit: F) -> Result<(), E>
    where
        F: Fn(V) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        match self {
            Self::Sequential(s) => s.run(visit).await,
            Self::Parallel(p) => p.run(visit).await,
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::Parallel(_))
    }
}
