// ABOUTME: Error types for binder storage operations
// ABOUTME: Duplicate writes are the only way a store can fail

use thiserror::Error;

use crate::key::KeyId;

#[derive(Error, Debug, Clone)]
pub enum BinderError {
    /// Returned when a binding is stored for an id which already has a stored
    /// binding. Under a validated graph this implies a programming error in a
    /// task, since provider uniqueness rules out two tasks binding one key.
    #[error("duplicate binding: \"{id}\"")]
    DuplicateBinding { id: KeyId },
}

pub type Result<T> = std::result::Result<T, BinderError>;
