use super::types::{CommandLog, RunResult, StackCloudRun, StackRun, StackRunTask};
use crate::error::TaskError;

/// Lifecycle callbacks invoked synchronously around each task.
///
/// Every method has a no-op default.
pub trait RunHooks: Send + Sync {
    fn before(&self, _run: &StackCloudRun) {}

    fn after(&self, _run: &StackCloudRun, _result: &RunResult, _err: Option<&TaskError>) {}

    /// Whether the task's output should be captured and forwarded to `sync_logs`.
    fn log_sync_condition(&self, _task: &StackRunTask, _run: &StackRun) -> bool {
        false
    }

    fn sync_logs(&self, _run: &StackRun, _logs: &[CommandLog]) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl RunHooks for NoopHooks {}
