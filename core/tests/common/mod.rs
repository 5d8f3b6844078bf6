#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use stackflow_core::api::{
    CancelSignals, CommandLog, ErrorKind, EvalContext, EvalError, Input, InputSource, NoopHooks,
    Orchestrator, OutputTarget, Project, ProjectError, RunAllOptions, RunHooks, RunResult,
    SharedBuffer, SharingBackend, Stack, StackCloudRun, StackRun, StackRunTask, TaskError,
};

/// A project rooted in a temp dir, with one directory per stack.
pub struct TestProject {
    pub root: tempfile::TempDir,
    pub stacks: Vec<Stack>,
    pub inputs: HashMap<String, Vec<Input>>,
    pub backends: Vec<SharingBackend>,
    pub broken_env: Vec<String>,
}

impl TestProject {
    pub fn new(stacks: Vec<Stack>) -> Self {
        let root = tempfile::tempdir().unwrap();
        for stack in &stacks {
            std::fs::create_dir_all(stack.host_dir(root.path())).unwrap();
        }
        Self {
            root,
            stacks,
            inputs: HashMap::new(),
            backends: Vec::new(),
            broken_env: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn input(mut self, consumer: &str, provider_id: &str, name: &str, mock: Option<&str>) -> Self {
        self.inputs.entry(consumer.to_string()).or_default().push(Input {
            name: name.to_string(),
            backend: "default".to_string(),
            from_stack_id: format!("\"{provider_id}\""),
            value: format!("outputs.{name}"),
            mock: mock.map(str::to_string),
        });
        self
    }

    pub fn backend(mut self, script: &str) -> Self {
        self.backends.push(SharingBackend {
            name: "default".to_string(),
            command: vec!["sh".into(), "-c".into(), script.into()],
        });
        self
    }
}

impl Project for TestProject {
    fn root_dir(&self) -> &Path {
        self.root.path()
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
                reason: "bad env".into(),
            });
        }
        Ok(vec![("STACK_DIR".to_string(), stack.dir.clone())])
    }
}

/// JSON literals, plus `outputs.<path>` lookups.
pub struct TestEval;

impl EvalContext for TestEval {
    fn eval(&self, _stack: &Stack, expr: &str, outputs: Option<&Value>) -> Result<Value, EvalError> {
        let fail = |reason: &str| EvalError::Expr {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };
        if let Some(path) = expr.strip_prefix("outputs.") {
            let mut cur = outputs.ok_or_else(|| fail("no outputs"))?;
            for seg in path.split('.') {
                cur = cur.get(seg).ok_or_else(|| fail("no such output"))?;
            }
            return Ok(cur.clone());
        }
        serde_json::from_str(expr).map_err(|e| fail(&e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Before {
        stack: String,
        cmd: String,
    },
    After {
        stack: String,
        cmd: String,
        exit_code: i32,
        err: Option<ErrorKind>,
    },
}

/// Hooks recording every call.
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<Event>>,
    pub envs: Mutex<Vec<(String, Vec<(String, String)>)>>,
    pub logs: Mutex<Vec<CommandLog>>,
    pub sync_logs: bool,
}

impl Recorder {
    pub fn with_log_sync() -> Self {
        Self {
            sync_logs: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn env_of(&self, stack: &str, key: &str) -> Option<String> {
        self.envs
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == stack)
            .flat_map(|(_, env)| env.iter())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

impl RunHooks for Recorder {
    fn before(&self, run: &StackCloudRun) {
        self.envs
            .lock()
            .unwrap()
            .push((run.stack.dir.clone(), run.env.clone()));
        self.events.lock().unwrap().push(Event::Before {
            stack: run.stack.dir.clone(),
            cmd: run.task.cmd_string(),
        });
    }

    fn after(&self, run: &StackCloudRun, result: &RunResult, err: Option<&TaskError>) {
        self.events.lock().unwrap().push(Event::After {
            stack: run.stack.dir.clone(),
            cmd: run.task.cmd_string(),
            exit_code: result.exit_code,
            err: err.map(TaskError::kind),
        });
    }

    fn log_sync_condition(&self, _task: &StackRunTask, _run: &StackRun) -> bool {
        self.sync_logs
    }

    fn sync_logs(&self, _run: &StackRun, logs: &[CommandLog]) {
        self.logs.lock().unwrap().extend_from_slice(logs);
    }
}

pub fn sh(script: &str) -> StackRunTask {
    StackRunTask::new(["sh", "-c", script])
}

/// Options that keep the test process's terminal out of the picture.
pub fn options(out: &SharedBuffer, err: &SharedBuffer) -> RunAllOptions {
    RunAllOptions {
        stdin: InputSource::Null,
        stdout: OutputTarget::Buffer(out.clone()),
        stderr: OutputTarget::Buffer(err.clone()),
        handle_interrupts: false,
        ..Default::default()
    }
}

pub fn orchestrator(project: TestProject, hooks: Arc<Recorder>) -> (Orchestrator, PathBuf) {
    let root = project.path().to_path_buf();
    let orch = Orchestrator::new(
        Arc::new(project),
        Arc::new(TestEval),
        hooks,
        CancelSignals::new(),
    );
    (orch, root)
}

pub fn noop_orchestrator(project: TestProject) -> Orchestrator {
    Orchestrator::new(
        Arc::new(project),
        Arc::new(TestEval),
        Arc::new(NoopHooks),
        CancelSignals::new(),
    )
}

pub fn run_of(project: &TestProject, dir: &str, tasks: Vec<StackRunTask>) -> StackRun {
    let stack = project
        .stacks
        .iter()
        .find(|s| s.dir == dir)
        .cloned()
        .unwrap();
    StackRun::new(stack, tasks)
}
