//! In-memory collaborators shared by unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ProjectError;
use crate::stack::{Input, Project, SharingBackend, Stack};

pub struct MemProject {
    pub root: PathBuf,
    pub stacks: Vec<Stack>,
    pub inputs: HashMap<String, Vec<Input>>,
    pub backends: Vec<SharingBackend>,
    pub env: HashMap<String, Vec<(String, String)>>,
    pub broken_env: Vec<String>,
    pub external: HashMap<String, Vec<String>>,
}

impl MemProject {
    pub fn new(stacks: Vec<Stack>) -> Self {
        Self {
            root: PathBuf::from("/tmp"),
            stacks,
            inputs: HashMap::new(),
            backends: Vec::new(),
            env: HashMap::new(),
            broken_env: Vec::new(),
            external: HashMap::new(),
        }
    }

    /// Stacks `/<id>` with matching IDs.
    pub fn with_ids(ids: &[&str]) -> Self {
        Self::new(
            ids.iter()
                .map(|id| Stack::new(format!("/{id}")).with_id(*id))
                .collect(),
        )
    }

    /// `consumer` reads output `name` of the stack with ID `provider_id`.
    pub fn input(mut self, consumer: &str, provider_id: &str, name: &str) -> Self {
        self.inputs
            .entry(consumer.to_string())
            .or_default()
            .push(Input {
                name: name.to_string(),
                backend: "default".to_string(),
                from_stack_id: format!("\"{provider_id}\""),
                value: format!("outputs.{name}"),
                mock: None,
            });
        self
    }

    pub fn external(mut self, consumer: &str, provider: &str) -> Self {
        self.external
            .entry(consumer.to_string())
            .or_default()
            .push(provider.to_string());
        self
    }
}

impl Project for MemProject {
    fn root_dir(&self) -> &Path {
        &self.root
    }

    fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    fn inputs(&self, stack: &Stack) -> Vec<Input> {
        self.inputs.get(&stack.dir).cloned().unwrap_or_default()
    }

    fn sharing_backend(&self, name: &str) -> Option<SharingBackend> {
        self.backends.iter().find(|b| b.name == name).cloned()
    }

    fn stack_env(&self, stack: &Stack) -> Result<Vec<(String, String)>, ProjectError> {
        if self.broken_env.contains(&stack.dir) {
            return Err(ProjectError::StackEnv {
                stack: stack.dir.clone(),
                reason: "bad env".to_string(),
            });
        }
        Ok(self.env.get(&stack.dir).cloned().unwrap_or_default())
    }

    fn external_dependencies(&self, stack: &Stack) -> Vec<String> {
        self.external.get(&stack.dir).cloned().unwrap_or_default()
    }
}
