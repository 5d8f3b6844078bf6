//! Execution DAG construction and scheduling.
//!
//! # Architecture
//!
//! ```text
//! Vec<StackRun>
//!   ↓
//! build_run_dag()  ← after/before/wants/wanted_by, parent dirs, data dependencies
//!   ↓
//! Dag<StackRun> { nodes, ancestors, descendants }
//!   ↓
//! Dag::validate() → cycle reported as "a -> b -> a"
//!   ↓
//! Scheduler::{Sequential, Parallel}::run(visit)
//! ```

pub mod dag;
pub mod order;
pub mod scheduler;

pub use dag::Dag;
pub use order::build_run_dag;
pub use scheduler::{Bounded, Parallel, Resource, ResourceGuard, Scheduler, Sequential, Unbounded};
