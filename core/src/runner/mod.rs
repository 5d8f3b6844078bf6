mod env;
mod hooks;
mod io_pump;
mod log_sync;
mod once_map;
mod process;
mod run;
mod sharing;
mod signals;
pub mod types;

pub use hooks::{NoopHooks, RunHooks};
pub use io_pump::MAX_LINE_SIZE;
pub use log_sync::{DEFAULT_BATCH_SIZE, DEFAULT_IDLE_DURATION};
pub use once_map::OnceMap;
pub use run::Orchestrator;
pub use signals::{spawn_interrupt_watcher, CancelSignals, DEFAULT_KILL_AFTER_INTERRUPTS};
pub use types::{
    CommandLog, InputSource, LogChannel, OutputTarget, RunAllOptions, RunResult, SharedBuffer,
    StackCloudRun, StackRun, StackRunTask,
};
