// ABOUTME: Maybe, a value-or-error wrapper used by optional key reads
// ABOUTME: Includes selection and aggregation helpers over collections of maybes

use std::sync::Arc;

use thiserror::Error;

use super::error::{is_plain_absent, ReadError};
use crate::binder::{IsAbsent, SharedBindError};

/// Errors from [`select_single`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    #[error("multiple present maybes passed to select_single")]
    MultiplePresent,
    #[error("no present maybes passed to select_single")]
    NonePresent,
}

/// Encapsulates a value or a shared error. Primarily produced by
/// [`optional`](super::optional) keys, whose reads never fail outright and
/// instead surface absence through the value.
#[derive(Debug, Clone)]
pub struct Maybe<T> {
    value: Option<T>,
    error: Option<SharedBindError>,
}

impl<T> Maybe<T> {
    /// A present maybe holding the given value.
    pub fn of(value: T) -> Self {
        Self {
            value: Some(value),
            error: None,
        }
    }

    /// An empty maybe carrying the plain-absence sentinel.
    pub fn absent() -> Self {
        Self {
            value: None,
            error: Some(Arc::new(IsAbsent)),
        }
    }

    /// An empty maybe carrying the given error.
    pub fn from_error(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            value: None,
            error: Some(Arc::new(err)),
        }
    }

    /// Encapsulate the outcome of a typed read.
    pub fn wrap(result: Result<T, ReadError>) -> Self {
        match result {
            Ok(value) => Self::of(value),
            Err(err) => Self::from_error(err),
        }
    }

    pub fn present(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    pub fn error(&self) -> Option<&SharedBindError> {
        self.error.as_ref()
    }
}

/// The uniformly-typed face of a [`Maybe`], useful for aggregating maybes of
/// mixed value types.
pub trait MaybeStatus {
    fn present(&self) -> bool;
    fn error(&self) -> Option<&SharedBindError>;
}

impl<T> MaybeStatus for Maybe<T> {
    fn present(&self) -> bool {
        Maybe::present(self)
    }

    fn error(&self) -> Option<&SharedBindError> {
        Maybe::error(self)
    }
}

/// The single present maybe in the given list. Errors when none or more than
/// one is present.
pub fn select_single<T>(maybes: impl IntoIterator<Item = Maybe<T>>) -> Result<T, SelectError> {
    let mut found = None;
    for maybe in maybes {
        if let Some(value) = maybe.into_value() {
            if found.is_some() {
                return Err(SelectError::MultiplePresent);
            }
            found = Some(value);
        }
    }
    found.ok_or(SelectError::NonePresent)
}

/// The first error among the maybes that is not plain absence. Absent-by-design
/// inputs are expected; propagated task errors are not.
pub fn first_error<'a>(
    maybes: impl IntoIterator<Item = &'a dyn MaybeStatus>,
) -> Option<SharedBindError> {
    for maybe in maybes {
        if let Some(err) = maybe.error() {
            if !is_plain_absent(err.as_ref()) {
                return Some(err.clone());
            }
        }
    }
    None
}

/// The names of the maybes which are not present, sorted for stable output.
pub fn missing_names<'a>(
    named: impl IntoIterator<Item = (&'a str, &'a dyn MaybeStatus)>,
) -> Vec<String> {
    let mut missing: Vec<String> = named
        .into_iter()
        .filter(|(_, maybe)| !maybe.present())
        .map(|(name, _)| name.to_string())
        .collect();
    missing.sort();
    missing
}
