use std::future::Future;

use crate::executor::dag::Dag;

/// Visits nodes one by one in topological order.
#[derive(Debug)]
pub struct Sequential<V> {
    dag: Dag<V>,
    reverse: bool,
}

impl<V: Clone> Sequential<V> {
    pub fn new(dag: Dag<V>, reverse: bool) -> Self {
        Self { dag, reverse }
    }

    /// Stops at the first error returned by `visit`.
    pub async fn run<F, Fut, E>(&self, visit: F) -> Result<(), E>
    where
        F: Fn(V) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let mut order = self.dag.order();
        if self.reverse {
            order.reverse();
        }

        for id in order {
            if let Some(value) = self.dag.node(&id) {
                visit(value.clone()).await?;
            }
        }
        Ok(())
    }
}
