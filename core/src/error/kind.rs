use std::fmt;

/// Coarse classification shared by every error the core surfaces.
///
/// Hooks and the binary branch on this instead of matching messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The process ran and exited with a code that counts as failure.
    ExecutionFailed,
    /// Skipped after scheduling stopped, or killed by interrupt escalation.
    ExecutionCanceled,
    /// Something before spawning failed: input evaluation, command lookup.
    CommandNotExecuted,
    CycleDetected,
    InvalidFilter,
    Evaluation,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExecutionFailed => "execution failed",
            Self::ExecutionCanceled => "execution canceled",
            Self::CommandNotExecuted => "command not executed",
            Self::CycleDetected => "cycle detected",
            Self::InvalidFilter => "invalid filter combination",
            Self::Evaluation => "evaluation failed",
            Self::Config => "configuration error",
            Self::Internal => "internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
