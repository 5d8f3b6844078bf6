use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::SchedulerError;
use crate::executor::dag::Dag;

use super::resource::{Resource, ResourceGuard};

/// Dispatches every node whose predecessors have all returned, bounded by
/// the injected resource.
pub struct Parallel<V> {
    dag: Dag<V>,
    reverse: bool,
    resource: Arc<dyn Resource>,
    cancel: CancellationToken,
}

/// One turn of the dispatch loop.
enum Step<'a, T> {
    Finished(Option<(String, T)>),
    Acquired(&'a str, Result<ResourceGuard, SchedulerError>),
    /// The limiter was canceled and nothing is in flight.
    Alone(&'a str),
}

impl<V: Clone> Parallel<V> {
    /// Once `cancel` fires the limiter is bypassed: the remaining nodes are
    /// still visited so the caller can report them, but one at a time after
    /// everything in flight has returned.
    pub fn new(
        dag: Dag<V>,
        reverse: bool,
        resource: Arc<dyn Resource>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            dag,
            reverse,
            resource,
            cancel,
        }
    }

    /// A node leaves the ready set only once it holds a slot. After the
    /// first error nothing else is dispatched, including nodes that were
    /// waiting for a slot; visits already in flight run to completion and
    /// the first error is returned.
    pub async fn run<F, Fut, E>(&self, visit: F) -> Result<(), E>
    where
        F: Fn(V) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let mut pending: HashMap<&str, usize> = self
            .dag
            .ids()
            .map(|id| (id, self.prerequisites(id).len()))
            .collect();
        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(id, _)| *id)
            .collect();

        let visit = &visit;
        let launch = |id: String, value: V, slot: Option<ResourceGuard>| async move {
            let _slot = slot;
            (id, visit(value).await)
        };
        let mut running = FuturesUnordered::new();
        let mut limiter_open = true;
        let mut first_err: Option<E> = None;

        loop {
            let next = ready.first().copied().filter(|_| first_err.is_none());
            let step = match next {
                Some(id) if limiter_open => tokio::select! {
                    biased;
                    slot = self.resource.acquire(&self.cancel) => Step::Acquired(id, slot),
                    done = running.next(), if !running.is_empty() => Step::Finished(done),
                },
                Some(id) if running.is_empty() => Step::Alone(id),
                _ => Step::Finished(running.next().await),
            };

            match step {
                Step::Acquired(id, Ok(guard)) => {
                    ready.remove(id);
                    if let Some(value) = self.dag.node(id).cloned() {
                        running.push(launch(id.to_string(), value, Some(guard)));
                    }
                }
                Step::Acquired(id, Err(e)) => {
                    tracing::debug!(node = %id, error = %e, "limiter canceled, visiting the rest one at a time");
                    limiter_open = false;
                }
                Step::Alone(id) => {
                    ready.remove(id);
                    if let Some(value) = self.dag.node(id).cloned() {
                        running.push(launch(id.to_string(), value, None));
                    }
                }
                Step::Finished(None) => break,
                Step::Finished(Some((id, res))) => {
                    if let Err(e) = res {
                        tracing::debug!(node = %id, "visit failed, no further dispatch");
                        if first_err.is_none() {
                            first_err = Some(e);
                        }
                    }

                    for next in self.unlocks(&id) {
                        if let Some(n) = pending.get_mut(next.as_str()) {
                            *n -= 1;
                            if *n == 0 {
                                ready.insert(next.as_str());
                            }
                        }
                    }
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn prerequisites(&self, id: &str) -> &[String] {
        if self.reverse {
            self.dag.descendants_of(id)
        } else {
            self.dag.ancestors_of(id)
        }
    }

    fn unlocks(&self, id: &str) -> &[String] {
        if self.reverse {
            self.dag.ancestors_of(id)
        } else {
            self.dag.descendants_of(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::scheduler::resource::{Bounded, Unbounded};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn dag(nodes: &[&str], edges: &[(&str, &str)]) -> Dag<String> {
        let mut dag = Dag::new();
        for id in nodes {
            dag.add_node(*id, id.to_string()).unwrap();
        }
        for (before, after) in edges {
            dag.add_edge(before, after);
        }
        dag
    }

    fn position(events: &[String], event: &str) -> usize {
        events.iter().position(|e| e == event).unwrap()
    }

    #[tokio::test]
    async fn test_dependents_start_after_dependencies_return() {
        // a -> c, b -> c, c -> d
        let d = dag(&["a", "b", "c", "d"], &[("a", "c"), ("b", "c"), ("c", "d")]);
        let events = Mutex::new(Vec::new());
        let sched = Parallel::new(d, false, Arc::new(Unbounded), CancellationToken::new());

        sched
            .run(|v| {
                let events = &events;
                async move {
                    events.lock().unwrap().push(format!("start:{v}"));
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    events.lock().unwrap().push(format!("end:{v}"));
                    Ok::<(), ()>(())
                }
            })
            .await
            .unwrap();

        let events = events.into_inner().unwrap();
        assert_eq!(events.len(), 8);
        for (before, after) in [("a", "c"), ("b", "c"), ("c", "d")] {
            assert!(
                position(&events, &format!("end:{before}"))
                    < position(&events, &format!("start:{after}")),
                "{before} must finish before {after} starts: {events:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_reverse_flips_edges() {
        let d = dag(&["a", "b"], &[("a", "b")]);
        let order = Mutex::new(Vec::new());
        Parallel::new(d, true, Arc::new(Unbounded), CancellationToken::new())
            .run(|v| {
                order.lock().unwrap().push(v);
                async { Ok::<(), ()>(()) }
            })
            .await
            .unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let nodes: Vec<String> = (0..12).map(|i| format!("n{i:02}")).collect();
        let refs: Vec<&str> = nodes.iter().map(String::as_str).collect();
        let d = dag(&refs, &[]);

        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let sched = Parallel::new(d, false, Arc::new(Bounded::new(3)), CancellationToken::new());

        sched
            .run(|_| {
                let (active, peak) = (&active, &peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(15)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<(), ()>(())
                }
            })
            .await
            .unwrap();

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak}");
        assert!(peak > 1, "independent nodes should overlap");
    }

    #[tokio::test]
    async fn test_first_error_stops_dispatch_but_inflight_finish() {
        // a fails quickly while b is still running; c depends on a.
        let d = dag(&["a", "b", "c"], &[("a", "c")]);
        let finished = Mutex::new(Vec::new());
        let sched = Parallel::new(d, false, Arc::new(Unbounded), CancellationToken::new());

        let res = sched
            .run(|v| {
                let finished = &finished;
                async move {
                    if v == "b" {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                    }
                    finished.lock().unwrap().push(v.clone());
                    if v == "a" {
                        Err(format!("{v} failed"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert_eq!(res, Err("a failed".to_string()));
        let finished = finished.into_inner().unwrap();
        assert!(finished.contains(&"b".to_string()));
        assert!(!finished.contains(&"c".to_string()));
    }

    #[tokio::test]
    async fn test_nodes_waiting_for_a_slot_are_dropped_after_error() {
        let d = dag(&["a", "b", "c"], &[]);
        let visited = Mutex::new(Vec::new());
        let sched = Parallel::new(d, false, Arc::new(Bounded::new(1)), CancellationToken::new());

        let res = sched
            .run(|v| {
                visited.lock().unwrap().push(v.clone());
                async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    if v == "a" {
                        Err(format!("{v} failed"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert_eq!(res, Err("a failed".to_string()));
        assert_eq!(visited.into_inner().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_canceled_limiter_visits_one_at_a_time() {
        let nodes: Vec<String> = (0..4).map(|i| format!("n{i}")).collect();
        let refs: Vec<&str> = nodes.iter().map(String::as_str).collect();
        let d = dag(&refs, &[]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        Parallel::new(d, false, Arc::new(Bounded::new(2)), cancel)
            .run(|_| {
                let (active, peak) = (&active, &peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<(), ()>(())
                }
            })
            .await
            .unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_canceled_acquire_still_visits() {
        let d = dag(&["a", "b"], &[]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let visited = AtomicUsize::new(0);
        Parallel::new(d, false, Arc::new(Bounded::new(1)), cancel)
            .run(|_| {
                visited.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), ()>(()) }
            })
            .await
            .unwrap();
        assert_eq!(visited.load(Ordering::SeqCst), 2);
    }
}
