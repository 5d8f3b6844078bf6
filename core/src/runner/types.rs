use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;

use crate::stack::Stack;

/// One command invocation bound to a stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackRunTask {
    pub cmd: Vec<String>,

    /// Origin of the command when it comes from a script.
    pub script_idx: usize,
    pub script_job_idx: usize,
    pub script_cmd_idx: usize,

    pub cloud_sync_deployment: bool,
    pub cloud_sync_drift_status: bool,
    pub cloud_sync_preview: bool,
    pub cloud_sync_layer: String,
    pub cloud_plan_file: String,
    pub cloud_plan_provisioner: String,

    pub use_terragrunt: bool,
    pub enable_sharing: bool,
    pub mock_on_fail: bool,
}

impl StackRunTask {
    pub fn new<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn cmd_string(&self) -> String {
        self.cmd.join(" ")
    }

    /// 0 always succeeds. Drift checks, and previews with a plan file, use 2
    /// for "changes detected".
    pub fn is_success_exit(&self, code: i32) -> bool {
        if code == 0 {
            return true;
        }
        if self.cloud_sync_drift_status
            || (self.cloud_sync_preview && !self.cloud_plan_file.is_empty())
        {
            return code == 2;
        }
        false
    }
}

/// A stack and the tasks to run in it, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRun {
    pub stack: Stack,
    pub tasks: Vec<StackRunTask>,
    /// Task reporting to the sync collaborator, if any.
    #[serde(default)]
    pub sync_task_index: Option<usize>,
}

impl StackRun {
    pub fn new(stack: Stack, tasks: Vec<StackRunTask>) -> Self {
        Self {
            stack,
            tasks,
            sync_task_index: None,
        }
    }

    pub fn with_sync_task(mut self, index: usize) -> Self {
        self.sync_task_index = Some(index);
        self
    }
}

/// What hooks receive for each task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackCloudRun {
    pub stack: Stack,
    pub task: StackRunTask,
    /// Environment the process was (or would have been) started with.
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub exit_code: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunResult {
    /// Result for a task whose process never started.
    pub fn not_started(exit_code: i32) -> Self {
        Self {
            exit_code,
            started_at: None,
            finished_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogChannel {
    Stdout,
    Stderr,
}

/// One captured output line handed to the log-sync hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLog {
    pub channel: LogChannel,
    /// 1-based, counted per channel.
    pub line: u64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Where a spawned process writes one of its output streams.
#[derive(Debug, Clone, Default)]
pub enum OutputTarget {
    #[default]
    Inherit,
    Null,
    Buffer(SharedBuffer),
}

impl OutputTarget {
    pub(crate) fn writer(&self, channel: LogChannel) -> Box<dyn AsyncWrite + Unpin + Send> {
        match (self, channel) {
            (Self::Inherit, LogChannel::Stdout) => Box::new(tokio::io::stdout()),
            (Self::Inherit, LogChannel::Stderr) => Box::new(tokio::io::stderr()),
            (Self::Null, _) => Box::new(tokio::io::sink()),
            (Self::Buffer(buf), _) => Box::new(buf.clone()),
        }
    }

    /// Writes a status line the orchestrator prints itself.
    pub(crate) fn println(&self, channel: LogChannel, line: &str) {
        match (self, channel) {
            (Self::Inherit, LogChannel::Stdout) => println!("{line}"),
            (Self::Inherit, LogChannel::Stderr) => eprintln!("{line}"),
            (Self::Null, _) => {}
            (Self::Buffer(buf), _) => {
                buf.append(line.as_bytes());
                buf.append(b"\n");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputSource {
    #[default]
    Inherit,
    Null,
}

/// In-memory sink shared between the caller and spawned processes.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, bytes: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(bytes);
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap_or_else(|e| e.into_inner())).into_owned()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.append(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Knobs for one `run_all` call.
#[derive(Debug, Clone)]
pub struct RunAllOptions {
    pub quiet: bool,
    pub dry_run: bool,
    pub reverse: bool,
    pub script_run: bool,
    pub continue_on_error: bool,
    /// 1 runs stacks one at a time.
    pub parallel: usize,
    pub stdin: InputSource,
    pub stdout: OutputTarget,
    pub stderr: OutputTarget,
    /// Install a Ctrl-C handler for the duration of the run.
    pub handle_interrupts: bool,
}

impl Default for RunAllOptions {
    fn default() -> Self {
        Self {
            quiet: false,
            dry_run: false,
            reverse: false,
            script_run: false,
            continue_on_error: false,
            parallel: 1,
            stdin: InputSource::Inherit,
            stdout: OutputTarget::Inherit,
            stderr: OutputTarget::Inherit,
            handle_interrupts: true,
        }
    }
}
