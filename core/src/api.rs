//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `stackflow_core::api` instead of reaching into internal modules.

pub use crate::config::{load_default, AppConfig, LoggingConfig, RunConfig};
pub use crate::error::{
    CliError, DagError, ErrorKind, EvalError, FilterError, GraphError, ProjectError, RunError,
    SchedulerError, SharingError, StackError, TaskError,
};
pub use crate::eval::{eval_from_stack_id, EvalContext};
pub use crate::executor::{build_run_dag, Dag, Scheduler};
pub use crate::graph::{add_wanted_of, apply_dependency_filters, DependencyFilters, DependencyGraph};
pub use crate::runner::{
    CancelSignals, CommandLog, InputSource, LogChannel, NoopHooks, Orchestrator, OutputTarget,
    RunAllOptions, RunHooks, RunResult, SharedBuffer, StackCloudRun, StackRun, StackRunTask,
};
pub use crate::stack::{Input, Project, SharingBackend, Stack, TagQuery};
