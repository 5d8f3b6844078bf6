//! Data-dependency graph and the stack-selection algebra built on it.
//!
//! Only data dependencies (cross-stack output references and external tool
//! declarations) become edges here. Ordering attributes never widen a
//! selection; they are handled by the execution DAG builder.

pub mod dependencies;
pub mod filters;
pub mod wants;

pub use dependencies::DependencyGraph;
pub use filters::{apply_dependency_filters, DependencyFilters};
pub use wants::add_wanted_of;
