use serde::{Deserialize, Serialize};

use crate::runner::DEFAULT_KILL_AFTER_INTERRUPTS;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory`.
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "stackflow_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses ~/.stackflow/logs.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

/// Defaults for `stackflow run`; command-line flags take precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    #[serde(default)]
    pub continue_on_error: bool,

    #[serde(default)]
    pub reverse: bool,

    #[serde(default)]
    pub quiet: bool,

    /// Interrupts needed before running commands are killed.
    #[serde(default = "default_kill_after_interrupts")]
    pub kill_after_interrupts: usize,
}

fn default_parallel() -> usize {
    1
}

fn default_kill_after_interrupts() -> usize {
    DEFAULT_KILL_AFTER_INTERRUPTS
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            continue_on_error: false,
            reverse: false,
            quiet: false,
            kill_after_interrupts: default_kill_after_interrupts(),
        }
    }
}
