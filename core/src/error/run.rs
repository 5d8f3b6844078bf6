use thiserror::Error;

use super::error::{EvalError, ProjectError};
use super::executor::DagError;
use super::graph::GraphError;
use super::kind::ErrorKind;

/// Outcome of a single task that did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("execution failed: running `{cmd}` in stack {stack}: {reason}")]
    Failed {
        stack: String,
        cmd: String,
        reason: String,
    },

    #[error("execution canceled: `{cmd}` in stack {stack}: {reason}")]
    Canceled {
        stack: String,
        cmd: String,
        reason: String,
    },

    #[error("command not executed: `{cmd}` in stack {stack}: {reason}")]
    NotExecuted {
        stack: String,
        cmd: String,
        reason: String,
    },
}

impl TaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Failed { .. } => ErrorKind::ExecutionFailed,
            Self::Canceled { .. } => ErrorKind::ExecutionCanceled,
            Self::NotExecuted { .. } => ErrorKind::CommandNotExecuted,
        }
    }

    pub fn stack(&self) -> &str {
        match self {
            Self::Failed { stack, .. } | Self::Canceled { stack, .. } | Self::NotExecuted { stack, .. } => {
                stack
            }
        }
    }
}

/// Failures while resolving a task's inputs from other stacks' outputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharingError {
    #[error("evaluating input {input}: {source}")]
    Eval {
        input: String,
        #[source]
        source: EvalError,
    },

    #[error("evaluating input {input}: {value_err}; mock also failed: {mock_err}")]
    Mock {
        input: String,
        value_err: EvalError,
        mock_err: EvalError,
    },

    #[error("stack {stack} needs output from stack ID {id:?} but it cannot be found")]
    StackNotFound { stack: String, id: String },

    #[error("sharing backend {0} not found")]
    BackendNotFound(String),

    #[error("sharing backend command `{command}` failed: {reason}")]
    BackendCommand { command: String, reason: String },

    #[error("parsing sharing backend output of stack {stack}: {reason}")]
    BackendOutput { stack: String, reason: String },

    #[error("sharing backend command `{command}` aborted by CTRL-C")]
    Canceled { command: String },
}

impl SharingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Canceled { .. } => ErrorKind::ExecutionCanceled,
            _ => ErrorKind::CommandNotExecuted,
        }
    }
}

/// Every task error collected while running one stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("stack {stack}: {}", join_lines(.errors))]
pub struct StackError {
    pub stack: String,
    pub errors: Vec<TaskError>,
}

impl StackError {
    /// Canceled only when nothing in the stack actually failed.
    pub fn kind(&self) -> ErrorKind {
        self.errors
            .iter()
            .map(TaskError::kind)
            .find(|k| *k != ErrorKind::ExecutionCanceled)
            .unwrap_or(ErrorKind::ExecutionCanceled)
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("indexing data dependencies: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Dag(#[from] DagError),

    #[error("loading stack environments: {}", join_lines(.0))]
    StackEnv(Vec<ProjectError>),

    #[error("{}", join_lines(.0))]
    Stacks(Vec<StackError>),

}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Graph(e) => e.kind(),
            Self::Dag(e) => e.kind(),
            Self::StackEnv(_) => ErrorKind::Config,
            Self::Stacks(errs) => errs
                .iter()
                .map(StackError::kind)
                .find(|k| *k != ErrorKind::ExecutionCanceled)
                .unwrap_or(ErrorKind::ExecutionCanceled),
        }
    }

    /// Task errors of every failed stack, in the order they were recorded.
    pub fn task_errors(&self) -> Vec<&TaskError> {
        match self {
            Self::Stacks(errs) => errs.iter().flat_map(|e| e.errors.iter()).collect(),
            _ => Vec::new(),
        }
    }
}

fn join_lines<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
