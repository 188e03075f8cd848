// ABOUTME: Error types for graph construction and graph execution
// ABOUTME: Construction errors never come from run; run errors never come from build

use thiserror::Error;

use super::graph::MAX_TASKS;
use crate::binder::BinderError;
use crate::key::KeyId;

fn join_ids(ids: &[KeyId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from assembling a graph or exposing it as a task.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("too many tasks: {count} exceeds the limit of {MAX_TASKS}")]
    TooManyTasks { count: usize },

    #[error("duplicate task names: \"{name}\"")]
    DuplicateTaskNames { name: String },

    #[error("duplicate provided keys: \"{id}\" is provided by both \"{first}\" and \"{second}\"")]
    DuplicateProvidedKeys {
        id: KeyId,
        first: String,
        second: String,
    },

    #[error("graph cycle detected involving tasks: {tasks:?}")]
    Cycle { tasks: Vec<String> },

    #[error("exposed key not provided by graph \"{graph}\": \"{id}\"")]
    ExposedKeyNotProvided { id: KeyId, graph: String },
}

/// Errors from running a graph.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The run was started without bindings for some declared graph inputs.
    /// No tasks were executed.
    #[error("missing inputs: {}", join_ids(.missing))]
    MissingInputs { missing: Vec<KeyId> },

    /// A task produced a binding for a key that already had one. Provider
    /// uniqueness makes this unreachable unless a task binds keys outside its
    /// declaration.
    #[error(transparent)]
    DuplicateBinding(#[from] BinderError),

    /// A task's returned bindings did not line up with its declared provided
    /// keys.
    #[error(
        "task \"{task}\" did not provide its declared keys (missing: [{}]; unexpected: [{}])",
        join_ids(.missing),
        join_ids(.unexpected)
    )]
    ProvidesMismatch {
        task: String,
        missing: Vec<KeyId>,
        unexpected: Vec<KeyId>,
    },

    /// A task's execute function returned an error. The scheduler cancels the
    /// remaining tasks and surfaces the first such error.
    #[error("task \"{task}\" failed: {error}")]
    Task { task: String, error: anyhow::Error },

    /// The caller's cancellation token fired (or the run timed out) before the
    /// graph completed.
    #[error("graph execution cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
