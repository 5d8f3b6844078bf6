use thiserror::Error;

use super::kind::ErrorKind;
use super::run::RunError;
use super::graph::FilterError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("run failed: {0}")]
    Run(#[from] RunError),
    #[error("{0}")]
    Filter(#[from] FilterError),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

impl CliError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Run(e) => e.kind(),
            Self::Filter(e) => e.kind(),
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) | Self::Anyhow(_) => ErrorKind::Internal,
        }
    }
}

/// Failures reported by a `Project` implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectError {
    #[error("loading env of stack {stack}: {reason}")]
    StackEnv { stack: String, reason: String },
    #[error("{0}")]
    Other(String),
}

/// Failures reported by an `EvalContext` implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("evaluating `{expr}`: {reason}")]
    Expr { expr: String, reason: String },
    #[error("`{expr}` must evaluate to a string, got {got}")]
    NotAString { expr: String, got: String },
}
