use thiserror::Error;

use super::error::EvalError;
use super::kind::ErrorKind;

/// Errors while indexing data dependencies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("evaluating from_stack_id of input {input} in stack {stack}: {source}")]
    FromStackId {
        stack: String,
        input: String,
        #[source]
        source: EvalError,
    },
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Evaluation
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid filter combination: only one of {} can be set", .0.join(", "))]
    MultipleOnly(Vec<&'static str>),
    #[error("invalid filter combination: {0} cannot be combined with {1}")]
    Conflicting(&'static str, &'static str),
    #[error("dependency stack {0} not found")]
    DependencyNotFound(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl FilterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MultipleOnly(_) | Self::Conflicting(..) => ErrorKind::InvalidFilter,
            Self::DependencyNotFound(_) => ErrorKind::Config,
            Self::Graph(e) => e.kind(),
        }
    }
}
