// ABOUTME: Task module for the keyflow workflow library
// ABOUTME: Task construction, execution contexts, and conditional composition

pub mod conditional;
#[allow(clippy::module_inception)]
pub mod task;

pub use conditional::{AllTrue, AnyTrue, BoolKey, Condition, Conditional};
pub use task::{all_bound, IntoTasks, Task, TaskContext};
