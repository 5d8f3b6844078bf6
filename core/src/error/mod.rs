#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;
pub mod graph;
pub mod kind;
pub mod run;

pub use error::{CliError, EvalError, ProjectError};
pub use executor::{DagError, SchedulerError};
pub use graph::{FilterError, GraphError};
pub use kind::ErrorKind;
pub use run::{RunError, SharingError, StackError, TaskError};
