use thiserror::Error;

use super::kind::ErrorKind;

/// Errors raised while building or validating an execution DAG.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DagError {
    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// `reason` is the offending chain, e.g. `/a -> /b -> /a`.
    #[error("cycle detected: {reason}")]
    CycleDetected { reason: String },
}

impl DagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CycleDetected { .. } => ErrorKind::CycleDetected,
            Self::DuplicateNode(_) | Self::NodeNotFound(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("resource limiter closed unexpectedly")]
    LimiterClosed,
    #[error("acquire canceled")]
    AcquireCanceled,
}
