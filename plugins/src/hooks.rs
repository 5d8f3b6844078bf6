use std::sync::atomic::{AtomicUsize, Ordering};

use stackflow_core::api::{
    CommandLog, ErrorKind, LogChannel, RunHooks, RunResult, StackCloudRun, StackRun, StackRunTask,
    TaskError,
};

/// Reports task lifecycle through `tracing` and keeps a tally for the
/// end-of-run summary.
#[derive(Debug, Default)]
pub struct TracingHooks {
    /// Forward captured command output as `stackflow::command` debug events.
    capture_output: bool,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    canceled: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub canceled: usize,
}

impl TracingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_capture(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            canceled: self.canceled.load(Ordering::Relaxed),
        }
    }
}

impl RunHooks for TracingHooks {
    fn before(&self, run: &StackCloudRun) {
        tracing::info!(stack = %run.stack.dir, cmd = %run.task.cmd_string(), "task starting");
    }

    fn after(&self, run: &StackCloudRun, result: &RunResult, err: Option<&TaskError>) {
        let elapsed_ms = match (result.started_at, result.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        };
        match err {
            None => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    stack = %run.stack.dir,
                    exit_code = result.exit_code,
                    elapsed_ms = ?elapsed_ms,
                    "task finished"
                );
            }
            Some(e) => {
                let counter = if e.kind() == ErrorKind::ExecutionCanceled {
                    &self.canceled
                } else {
                    &self.failed
                };
                counter.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    stack = %run.stack.dir,
                    exit_code = result.exit_code,
                    error.kind = %e.kind(),
                    error.message = %e,
                    "task did not succeed"
                );
            }
        }
    }

    fn log_sync_condition(&self, _task: &StackRunTask, _run: &StackRun) -> bool {
        self.capture_output
    }

    fn sync_logs(&self, run: &StackRun, logs: &[CommandLog]) {
        for log in logs {
            let channel = match log.channel {
                LogChannel::Stdout => "stdout",
                LogChannel::Stderr => "stderr",
            };
            tracing::debug!(
                target: "stackflow::command",
                stack = %run.stack.dir,
                channel,
                line = log.line,
                "{}",
                log.message
            );
        }
    }
}
