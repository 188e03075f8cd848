// ABOUTME: Graph module for the keyflow workflow library
// ABOUTME: Graph assembly, validation, parallel execution, and DOT rendering

pub mod error;
#[allow(clippy::module_inception)]
pub mod graph;
pub mod graphviz;
pub mod scheduler;

pub use error::{ExecutionError, GraphError};
pub use graph::{Graph, GraphBuilder, MAX_TASKS};
