use std::path::PathBuf;
use std::process::Stdio;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{EvalError, SharingError};
use crate::eval::{eval_from_stack_id, EvalContext};
use crate::stack::{Input, Project, SharingBackend, Stack};

use super::env::Environ;
use super::once_map::OnceMap;

/// Parsed backend output per (originating stack dir, backend name).
pub(crate) type OutputsCache = OnceMap<(String, String), Result<Value, SharingError>>;

/// Resolves the inputs of a stack into `TF_VAR_<name>` variables.
pub(crate) struct InputResolver<'a> {
    pub project: &'a dyn Project,
    pub eval: &'a dyn EvalContext,
    pub cache: &'a OutputsCache,
    /// Aborts a backend command that is still running.
    pub kill: &'a CancellationToken,
}

impl InputResolver<'_> {
    pub(crate) async fn resolve(
        &self,
        stack: &Stack,
        mock_on_fail: bool,
    ) -> Result<Environ, SharingError> {
        let mut vars = Vec::new();

        for input in self.project.inputs(stack) {
            let id = eval_from_stack_id(self.eval, stack, &input).map_err(|source| {
                SharingError::Eval {
                    input: input.name.clone(),
                    source,
                }
            })?;

            let other = self.project.stack_by_id(&id).ok_or_else(|| {
                SharingError::StackNotFound {
                    stack: stack.dir.clone(),
                    id: id.clone(),
                }
            })?;
            tracing::debug!(stack = %stack.dir, provider = %other.dir, input = %input.name, "stack depends on outputs");

            let backend = self
                .project
                .sharing_backend(&input.backend)
                .ok_or_else(|| SharingError::BackendNotFound(input.backend.clone()))?;

            let outputs = match self.outputs(other, &backend).await {
                Ok(v) => v,
                Err(e @ SharingError::BackendCommand { .. }) if mock_on_fail => {
                    tracing::warn!(stack = %stack.dir, error = %e, "sharing backend command failed, falling back to mocks");
                    Value::Null
                }
                Err(e) => return Err(e),
            };

            let value = match self.eval.eval(stack, &input.value, Some(&outputs)) {
                Ok(v) => v,
                Err(err) => self.mock(stack, &input, mock_on_fail, err)?,
            };

            let rendered = serde_json::to_string(&value).map_err(|e| SharingError::Eval {
                input: input.name.clone(),
                source: EvalError::Expr {
                    expr: input.value.clone(),
                    reason: e.to_string(),
                },
            })?;
            vars.push((format!("TF_VAR_{}", input.name), rendered));
        }

        Ok(vars)
    }

    fn mock(
        &self,
        stack: &Stack,
        input: &Input,
        mock_on_fail: bool,
        value_err: EvalError,
    ) -> Result<Value, SharingError> {
        let mock = match (&input.mock, mock_on_fail) {
            (Some(mock), true) => mock,
            _ => {
                return Err(SharingError::Eval {
                    input: input.name.clone(),
                    source: value_err,
                })
            }
        };

        match self.eval.eval(stack, mock, None) {
            Ok(v) => {
                tracing::warn!(stack = %stack.dir, input = %input.name, error = %value_err, "using mock value");
                Ok(v)
            }
            Err(mock_err) => Err(SharingError::Mock {
                input: input.name.clone(),
                value_err,
                mock_err,
            }),
        }
    }

    async fn outputs(&self, other: &Stack, backend: &SharingBackend) -> Result<Value, SharingError> {
        let key = (other.dir.clone(), backend.name.clone());
        let dir = self.project.host_dir(other);
        let stack = other.dir.clone();
        let command = backend.command.clone();
        let kill = self.kill.clone();
        self.cache
            .get_or_init(key, || run_backend(stack, dir, command, kill))
            .await
    }
}

async fn run_backend(
    stack: String,
    dir: PathBuf,
    command: Vec<String>,
    kill: CancellationToken,
) -> Result<Value, SharingError> {
    let cmd_str = command.join(" ");
    let Some((program, args)) = command.split_first() else {
        return Err(SharingError::BackendCommand {
            command: cmd_str,
            reason: "empty command".into(),
        });
    };

    tracing::debug!(stack = %stack, command = %cmd_str, "running sharing backend");
    let child = tokio::process::Command::new(program)
        .args(args)
        .current_dir(&dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SharingError::BackendCommand {
            command: cmd_str.clone(),
            reason: e.to_string(),
        })?;

    // Dropping the wait future drops the child, which kills it.
    let output = tokio::select! {
        biased;
        _ = kill.cancelled() => {
            tracing::warn!(stack = %stack, command = %cmd_str, "killing sharing backend");
            return Err(SharingError::Canceled { command: cmd_str });
        }
        out = child.wait_with_output() => out.map_err(|e| SharingError::BackendCommand {
            command: cmd_str.clone(),
            reason: e.to_string(),
        })?,
    };

    if !output.status.success() {
        return Err(SharingError::BackendCommand {
            command: cmd_str,
            reason: format!(
                "exit code {}, stdout: {}, stderr: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stdout).trim(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    serde_json::from_slice(&output.stdout).map_err(|e| SharingError::BackendOutput {
        stack,
        reason: e.to_string(),
    })
}
