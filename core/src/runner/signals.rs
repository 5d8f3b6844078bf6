use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_KILL_AFTER_INTERRUPTS: usize = 3;

/// The two cancellation signals of a run.
///
/// `stop_scheduling` keeps new tasks from starting; `kill` terminates
/// processes already running.
#[derive(Debug, Clone)]
pub struct CancelSignals {
    stop: CancellationToken,
    kill: CancellationToken,
    interrupts: Arc<AtomicUsize>,
    kill_after: usize,
}

impl Default for CancelSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignals {
    pub fn new() -> Self {
        Self::with_kill_threshold(DEFAULT_KILL_AFTER_INTERRUPTS)
    }

    pub fn with_kill_threshold(kill_after: usize) -> Self {
        Self {
            stop: CancellationToken::new(),
            kill: CancellationToken::new(),
            interrupts: Arc::new(AtomicUsize::new(0)),
            kill_after: kill_after.max(1),
        }
    }

    pub fn stop_scheduling(&self) -> &CancellationToken {
        &self.stop
    }

    pub fn kill(&self) -> &CancellationToken {
        &self.kill
    }

    pub fn interrupts(&self) -> usize {
        self.interrupts.load(Ordering::SeqCst)
    }

    /// Records an operator interrupt and escalates. Returns the count so far.
    pub fn interrupt(&self) -> usize {
        let n = self.interrupts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::warn!(interruptions = n, "interrupt received, no further stacks will start");
        self.stop.cancel();

        if n >= self.kill_after {
            tracing::warn!(interruptions = n, "killing running commands");
            self.kill.cancel();
        } else {
            tracing::warn!(
                remaining = self.kill_after - n,
                "interrupt again to kill running commands"
            );
        }
        n
    }
}

/// Feeds Ctrl-C into `signals` until the kill signal fires or the handle is aborted.
pub fn spawn_interrupt_watcher(signals: CancelSignals) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = signals.kill().cancelled() => return,
                res = tokio::signal::ctrl_c() => {
                    if let Err(e) = res {
                        tracing::warn!(error = %e, "unable to listen for interrupts");
                        return;
                    }
                    signals.interrupt();
                }
            }
        }
    })
}
