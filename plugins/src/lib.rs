pub mod expr;
pub mod hooks;
pub mod manifest;

pub use expr::PathEvaluator;
pub use hooks::{RunSummary, TracingHooks};
pub use manifest::{ManifestProject, MANIFEST_FILE};
