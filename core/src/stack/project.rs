use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ProjectError;

use super::types::Stack;

/// A value one stack consumes from another stack's outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub name: String,
    pub backend: String,
    /// Expression yielding the ID of the stack producing the value.
    pub from_stack_id: String,
    /// Expression evaluated against the producer's `outputs`.
    pub value: String,
    /// Expression used instead of `value` when evaluation fails and mocks are allowed.
    #[serde(default)]
    pub mock: Option<String>,
}

/// Command that prints a stack's outputs as a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharingBackend {
    pub name: String,
    pub command: Vec<String>,
}

/// The loaded project: every stack plus the per-stack declarations the core
/// needs but does not parse itself.
pub trait Project: Send + Sync {
    fn root_dir(&self) -> &Path;

    fn stacks(&self) -> &[Stack];

    fn stack_by_id(&self, id: &str) -> Option<&Stack> {
        if id.is_empty() {
            return None;
        }
        self.stacks().iter().find(|s| s.id == id)
    }

    fn stack_by_dir(&self, dir: &str) -> Option<&Stack> {
        self.stacks().iter().find(|s| s.dir == dir)
    }

    fn inputs(&self, stack: &Stack) -> Vec<Input>;

    fn sharing_backend(&self, name: &str) -> Option<SharingBackend>;

    /// Extra environment variables declared for the stack.
    fn stack_env(&self, stack: &Stack) -> Result<Vec<(String, String)>, ProjectError>;

    /// Data dependencies declared by an external tool (project paths).
    fn external_dependencies(&self, _stack: &Stack) -> Vec<String> {
        Vec::new()
    }

    fn host_dir(&self, stack: &Stack) -> PathBuf {
        stack.host_dir(self.root_dir())
    }
}
