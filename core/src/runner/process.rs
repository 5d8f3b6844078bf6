use std::path::PathBuf;
use std::process::Stdio;

use chrono::Utc;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

use super::env::lookup;
use super::io_pump::pump;
use super::types::{CommandLog, InputSource, LogChannel, OutputTarget, RunResult};

/// Everything needed to start one task's process.
pub(crate) struct ProcessSpec<'a> {
    pub stack: &'a str,
    pub cmd: &'a [String],
    pub dir: PathBuf,
    pub env: &'a [(String, String)],
    pub stdin: InputSource,
    pub stdout: OutputTarget,
    pub stderr: OutputTarget,
    /// Set when output must also be tapped line by line.
    pub log_tx: Option<mpsc::Sender<CommandLog>>,
}

impl ProcessSpec<'_> {
    fn error(&self, make: fn(String, String, String) -> TaskError, reason: String) -> TaskError {
        make(self.stack.to_string(), self.cmd.join(" "), reason)
    }

    fn needs_pipe(&self, target: &OutputTarget) -> bool {
        self.log_tx.is_some() || !matches!(target, OutputTarget::Inherit)
    }
}

fn failed(stack: String, cmd: String, reason: String) -> TaskError {
    TaskError::Failed { stack, cmd, reason }
}

fn canceled(stack: String, cmd: String, reason: String) -> TaskError {
    TaskError::Canceled { stack, cmd, reason }
}

fn not_executed(stack: String, cmd: String, reason: String) -> TaskError {
    TaskError::NotExecuted { stack, cmd, reason }
}

/// Starts the process and waits for it, or kills it once `kill` fires.
///
/// The returned error is `None` when the process ran and exited, whatever
/// the code; interpreting the code is up to the caller.
pub(crate) async fn execute(
    job: ProcessSpec<'_>,
    kill: &CancellationToken,
) -> (RunResult, Option<TaskError>) {
    let Some((program, args)) = job.cmd.split_first() else {
        let err = job.error(not_executed, "empty command".into());
        return (RunResult::not_started(-1), Some(err));
    };

    let path = match which::which_in(program, lookup(job.env, "PATH"), &job.dir) {
        Ok(p) => p,
        Err(e) => {
            let err = job.error(not_executed, format!("looking up {program}: {e}"));
            return (RunResult::not_started(-1), Some(err));
        }
    };

    let mut cmd = Command::new(&path);
    cmd.args(args)
        .current_dir(&job.dir)
        .env_clear()
        .envs(job.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .kill_on_drop(true)
        .stdin(match job.stdin {
            InputSource::Inherit => Stdio::inherit(),
            InputSource::Null => Stdio::null(),
        })
        .stdout(if job.needs_pipe(&job.stdout) {
            Stdio::piped()
        } else {
            Stdio::inherit()
        })
        .stderr(if job.needs_pipe(&job.stderr) {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });

    let started_at = Utc::now();
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            let result = RunResult {
                exit_code: -1,
                started_at: Some(started_at),
                finished_at: Some(Utc::now()),
            };
            let err = job.error(failed, format!("starting process: {e}"));
            return (result, Some(err));
        }
    };
    tracing::debug!(stack = %job.stack, program = %path.display(), pid = ?child.id(), "process started");

    let mut pumps = Vec::new();
    if let Some(out) = child.stdout.take() {
        pumps.push(pump(out, job.stdout.clone(), LogChannel::Stdout, job.log_tx.clone()));
    }
    if let Some(err) = child.stderr.take() {
        pumps.push(pump(err, job.stderr.clone(), LogChannel::Stderr, job.log_tx.clone()));
    }

    let (status, killed) = tokio::select! {
        res = child.wait() => (res, false),
        _ = kill.cancelled() => {
            tracing::warn!(stack = %job.stack, "killing process");
            if let Err(e) = child.start_kill() {
                tracing::error!(stack = %job.stack, error = %e, "failed to kill process");
            }
            (child.wait().await, true)
        }
    };

    for handle in pumps {
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(stack = %job.stack, error = %e, "copying process output"),
            Err(e) => tracing::error!(stack = %job.stack, error = %e, "output pump task failed"),
        }
    }

    let finished_at = Utc::now();
    let mut result = RunResult {
        exit_code: -1,
        started_at: Some(started_at),
        finished_at: Some(finished_at),
    };

    match status {
        Ok(status) => {
            result.exit_code = status.code().unwrap_or(-1);
            if killed {
                let err = job.error(canceled, "execution aborted by CTRL-C".into());
                return (result, Some(err));
            }
            (result, None)
        }
        Err(e) => {
            let make: fn(String, String, String) -> TaskError = if killed { canceled } else { failed };
            let err = job.error(make, format!("waiting for process: {e}"));
            (result, Some(err))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::runner::env::inherited;
    use crate::runner::types::SharedBuffer;
    use std::time::Duration;

    fn job<'a>(cmd: &'a [String], env: &'a [(String, String)], out: &SharedBuffer) -> ProcessSpec<'a> {
        ProcessSpec {
            stack: "/s",
            cmd,
            dir: std::env::temp_dir(),
            env,
            stdin: InputSource::Null,
            stdout: OutputTarget::Buffer(out.clone()),
            stderr: OutputTarget::Null,
            log_tx: None,
        }
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[tokio::test]
    async fn test_runs_with_given_env_only() {
        let env = vec![
            ("PATH".to_string(), std::env::var("PATH").unwrap()),
            ("GREETING".to_string(), "hi".to_string()),
        ];
        let cmd = sh("echo $GREETING; echo ${HOME:-nohome}; exit 3");
        let out = SharedBuffer::new();
        let (result, err) = execute(job(&cmd, &env, &out), &CancellationToken::new()).await;
        assert!(err.is_none());
        assert_eq!(result.exit_code, 3);
        assert!(result.started_at.is_some() && result.finished_at.is_some());
        assert_eq!(out.contents(), "hi\nnohome\n");
    }

    #[tokio::test]
    async fn test_unknown_program_is_not_executed() {
        let env = inherited();
        let cmd = vec!["definitely-not-a-real-binary-xyz".to_string()];
        let out = SharedBuffer::new();
        let (result, err) = execute(job(&cmd, &env, &out), &CancellationToken::new()).await;
        assert_eq!(result, RunResult::not_started(-1));
        assert!(matches!(err, Some(TaskError::NotExecuted { .. })));
    }

    #[tokio::test]
    async fn test_kill_cancels_running_process() {
        let env = inherited();
        let cmd = sh("exec sleep 30");
        let out = SharedBuffer::new();
        let kill = CancellationToken::new();
        let trigger = kill.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let (_, err) = execute(job(&cmd, &env, &out), &kill).await;
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(matches!(err, Some(TaskError::Canceled { .. })));
    }
}
