//! Stack orchestration core: dependency graph and filters, execution DAG,
//! schedulers and the run loop.

pub mod api;
pub mod config;
pub mod error;
pub mod eval;
pub mod executor;
pub mod graph;
pub mod runner;
pub mod stack;

#[cfg(test)]
mod testing;
