// ABOUTME: Main library module for the keyflow workflow library
// ABOUTME: Exports all core modules and provides the public API

//! Declarative orchestration of DAG-shaped workflows.
//!
//! A workflow is a set of [`Task`]s related by typed [`Key`]s: each task
//! declares the key ids it depends on and the key ids it provides, and the
//! edges of the graph fall out of those declarations. Running a [`Graph`]
//! seeds a [`Binder`] with the caller's inputs and executes every task as soon
//! as its dependencies are bound, with no parallelism cap, until the graph is
//! exhausted or a task fails.
//!
//! ```
//! use keyflow::{Graph, Key, Task};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let input = Key::<String>::new("input");
//! let reversed = Key::<String>::new("reversed");
//! let result = Key::<bool>::new("result");
//!
//! let graph = Graph::builder("palindrome")
//!     .task(Task::from_fn1(
//!         "reverse",
//!         reversed.clone(),
//!         input.clone(),
//!         |s: String| async move { Ok(s.chars().rev().collect()) },
//!     ))
//!     .task(Task::from_fn2(
//!         "compare",
//!         result.clone(),
//!         input.clone(),
//!         reversed,
//!         |a: String, b: String| async move { Ok(a == b) },
//!     ))
//!     .build()?;
//!
//! let binder = graph.run(vec![input.bind("racecar".to_string())]).await?;
//! assert!(result.get(binder.as_ref())?);
//! # Ok(())
//! # }
//! ```

pub mod binder;
pub mod graph;
pub mod key;
pub mod metrics;
pub mod task;

// Re-export commonly used types
pub use binder::{
    BindStatus, Binder, BinderError, Binding, ExposeBinder, IsAbsent, MapBinder, OverlayBinder,
    SharedBindError, SharedBinder, SharedValue,
};
pub use graph::{ExecutionError, Graph, GraphBuilder, GraphError, MAX_TASKS};
pub use key::{
    first_error, is_plain_absent, mapped, missing_names, not, optional, presence, select_single,
    Key, KeyId, Maybe, MaybeStatus, ReadError, ReadKey, SelectError,
};
pub use task::{
    all_bound, AllTrue, AnyTrue, BoolKey, Condition, Conditional, IntoTasks, Task, TaskContext,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
