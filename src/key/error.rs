// ABOUTME: Errors returned when reading typed values out of a binder
// ABOUTME: Read errors are ordinary values for tasks to handle, never fatal by themselves

use thiserror::Error;

use super::id::KeyId;
use crate::binder::{IsAbsent, SharedBindError};

/// Error from [`ReadKey::get`](super::ReadKey::get). Each variant corresponds
/// to one way a typed read can fail; none of them terminate a graph on their
/// own.
#[derive(Error, Debug, Clone)]
pub enum ReadError {
    /// The key is bound absent. `source` is the error carried by the binding,
    /// [`IsAbsent`] unless the providing task bound a more specific one.
    #[error("cannot get key \"{id}\": {source}")]
    Absent { id: KeyId, source: SharedBindError },

    /// The key has not been bound at all.
    #[error("cannot get key \"{id}\": is pending")]
    Pending { id: KeyId },

    /// The key is bound, but to a value of a different type. This can only
    /// happen when two keys are created with the same id but different type
    /// parameters.
    #[error("cannot get key \"{id}\": wrong type (want {want})")]
    WrongType { id: KeyId, want: &'static str },
}

impl ReadError {
    pub fn id(&self) -> &KeyId {
        match self {
            ReadError::Absent { id, .. } => id,
            ReadError::Pending { id } => id,
            ReadError::WrongType { id, .. } => id,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ReadError::Absent { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ReadError::Pending { .. })
    }

    pub fn is_wrong_type(&self) -> bool {
        matches!(self, ReadError::WrongType { .. })
    }
}

/// Whether an error represents plain absence: the [`IsAbsent`] sentinel
/// itself, or an absent read whose binding carried the sentinel. Propagated
/// task errors are not plain absence even though their bindings are absent.
pub fn is_plain_absent(err: &(dyn std::error::Error + 'static)) -> bool {
    if err.downcast_ref::<IsAbsent>().is_some() {
        return true;
    }
    match err.downcast_ref::<ReadError>() {
        Some(ReadError::Absent { source, .. }) => source.downcast_ref::<IsAbsent>().is_some(),
        _ => false,
    }
}
