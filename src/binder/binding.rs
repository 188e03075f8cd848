// ABOUTME: The tristate Binding record tying a key id to a value or error
// ABOUTME: Bindings are immutable and cheap to clone; pending ones are never stored

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::key::KeyId;

/// Error stored in an absent binding when no more specific error is supplied.
/// Callers can downcast a binding error to this type to distinguish plain
/// absence from propagated task errors.
#[derive(Debug, Clone, Copy, Error)]
#[error("is absent")]
pub struct IsAbsent;

/// Shared, type-erased value held by a present binding.
pub type SharedValue = Arc<dyn Any + Send + Sync>;

/// Shared error held by an absent binding. Absent bindings may carry arbitrary
/// errors so that tasks can propagate failure information without terminating
/// the graph.
pub type SharedBindError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// The tristate of a [`Binding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BindStatus {
    /// The key is unbound: no task has provided a binding for it and no input
    /// binding was supplied.
    Pending,
    /// The key is explicitly unbound: the task which provides it could not
    /// produce a value. The binding carries an error, [`IsAbsent`] by default.
    Absent,
    /// The key is bound to a value.
    Present,
}

impl fmt::Display for BindStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BindStatus::Pending => "PENDING",
            BindStatus::Absent => "ABSENT",
            BindStatus::Present => "PRESENT",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone)]
enum BindState {
    Present(SharedValue),
    Absent(SharedBindError),
    Pending,
}

/// An immutable record stating that a key id is present with a value, absent
/// with an error, or pending. Bindings are produced by the methods on
/// [`Key`](crate::key::Key); pending bindings are synthesized by
/// [`Binder::get`](crate::binder::Binder::get) and never stored.
#[derive(Clone)]
pub struct Binding {
    id: KeyId,
    state: BindState,
}

impl Binding {
    pub(crate) fn present(id: KeyId, value: SharedValue) -> Self {
        Self {
            id,
            state: BindState::Present(value),
        }
    }

    pub(crate) fn absent(id: KeyId) -> Self {
        Self::absent_with(id, Arc::new(IsAbsent))
    }

    pub(crate) fn absent_with(id: KeyId, err: SharedBindError) -> Self {
        Self {
            id,
            state: BindState::Absent(err),
        }
    }

    pub(crate) fn pending(id: KeyId) -> Self {
        Self {
            id,
            state: BindState::Pending,
        }
    }

    /// The id of the key bound by this binding.
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn status(&self) -> BindStatus {
        match self.state {
            BindState::Present(_) => BindStatus::Present,
            BindState::Absent(_) => BindStatus::Absent,
            BindState::Pending => BindStatus::Pending,
        }
    }

    /// The bound value, if this binding is present.
    pub fn value(&self) -> Option<&SharedValue> {
        match &self.state {
            BindState::Present(value) => Some(value),
            _ => None,
        }
    }

    /// The bound error, if this binding is absent.
    pub fn error(&self) -> Option<&SharedBindError> {
        match &self.state {
            BindState::Absent(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            BindState::Present(_) => write!(f, "PRESENT({})", self.id),
            BindState::Absent(err) => write!(f, "ABSENT({}: {})", self.id, err),
            BindState::Pending => write!(f, "PENDING({})", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_matches_state() {
        let id = KeyId::new("k");
        assert_eq!(
            Binding::present(id.clone(), Arc::new(1_i32)).status(),
            BindStatus::Present
        );
        assert_eq!(Binding::absent(id.clone()).status(), BindStatus::Absent);
        assert_eq!(Binding::pending(id).status(), BindStatus::Pending);
    }

    #[test]
    fn test_absent_defaults_to_is_absent() {
        let binding = Binding::absent(KeyId::new("k"));
        let err = binding.error().unwrap();
        assert!(err.downcast_ref::<IsAbsent>().is_some());
    }

    #[test]
    fn test_present_has_no_error() {
        let binding = Binding::present(KeyId::new("k"), Arc::new("v"));
        assert!(binding.error().is_none());
        assert!(binding.value().is_some());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(BindStatus::Pending.to_string(), "PENDING");
        assert_eq!(BindStatus::Absent.to_string(), "ABSENT");
        assert_eq!(BindStatus::Present.to_string(), "PRESENT");
    }
}
