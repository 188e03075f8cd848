// ABOUTME: Typed key handles over binder slots, plus derived read-only keys
// ABOUTME: Keys mint bindings and perform type-checked reads against a binder

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use super::error::ReadError;
use super::id::KeyId;
use super::maybe::Maybe;
use crate::binder::{BindStatus, Binder, Binding};

/// A key which can be read from a binder. Implemented by [`Key`] and by the
/// derived wrappers returned from [`presence`], [`mapped`], [`not`], and
/// [`optional`].
pub trait ReadKey<T>: Send + Sync {
    /// The type-parameter-less id which identifies the key.
    fn id(&self) -> KeyId;

    /// Retrieve the value for this key from the binder.
    fn get(&self, binder: &dyn Binder) -> Result<T, ReadError>;
}

/// A typed handle identifying an input and/or output of a task or graph.
/// Cheap to clone; keys with equal ids address the same binding slot
/// regardless of which instance is used.
pub struct Key<T> {
    id: KeyId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key<{}>({})", type_name::<T>(), self.id)
    }
}

impl<T: Clone + Send + Sync + 'static> Key<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: KeyId::new(name),
            _marker: PhantomData,
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: KeyId::namespaced(namespace, name),
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> KeyId {
        self.id.clone()
    }

    /// Bind this key to the given value.
    pub fn bind(&self, value: T) -> Binding {
        Binding::present(self.id.clone(), Arc::new(value))
    }

    /// Bind this key as absent with the default sentinel error.
    pub fn bind_absent(&self) -> Binding {
        Binding::absent(self.id.clone())
    }

    /// Bind this key as absent with a specific error, propagating failure
    /// information to downstream tasks without terminating the graph.
    pub fn bind_error(&self, err: impl std::error::Error + Send + Sync + 'static) -> Binding {
        Binding::absent_with(self.id.clone(), Arc::new(err))
    }
}

impl<T: Clone + Send + Sync + 'static> ReadKey<T> for Key<T> {
    fn id(&self) -> KeyId {
        self.id.clone()
    }

    fn get(&self, binder: &dyn Binder) -> Result<T, ReadError> {
        let binding = binder.get(&self.id);
        match binding.status() {
            BindStatus::Absent => Err(ReadError::Absent {
                id: self.id.clone(),
                source: binding
                    .error()
                    .cloned()
                    .unwrap_or_else(|| Arc::new(crate::binder::IsAbsent)),
            }),
            BindStatus::Pending => Err(ReadError::Pending {
                id: self.id.clone(),
            }),
            BindStatus::Present => match binding.value().and_then(|v| v.downcast_ref::<T>()) {
                Some(value) => Ok(value.clone()),
                None => Err(ReadError::WrongType {
                    id: self.id.clone(),
                    want: type_name::<T>(),
                }),
            },
        }
    }
}

/// Whether the wrapped key is bound present. Never errors.
pub struct Presence<T, K> {
    inner: K,
    _marker: PhantomData<fn() -> T>,
}

/// A read-only key reporting whether the underlying key is present in the
/// binder. Useful for gating conditionals on keys of any type.
pub fn presence<T, K: ReadKey<T>>(key: K) -> Presence<T, K> {
    Presence {
        inner: key,
        _marker: PhantomData,
    }
}

impl<T, K: ReadKey<T>> ReadKey<bool> for Presence<T, K> {
    fn id(&self) -> KeyId {
        self.inner.id()
    }

    fn get(&self, binder: &dyn Binder) -> Result<bool, ReadError> {
        Ok(binder.get(&self.inner.id()).status() == BindStatus::Present)
    }
}

/// Applies a pure mapping after a successful read of the wrapped key.
pub struct Mapped<In, Out, K, F> {
    inner: K,
    map: F,
    _marker: PhantomData<fn(In) -> Out>,
}

/// A read-only key which applies the given mapping function when `get` is
/// called. Primarily intended for deriving condition keys.
pub fn mapped<In, Out, K, F>(key: K, map: F) -> Mapped<In, Out, K, F>
where
    K: ReadKey<In>,
    F: Fn(In) -> Out + Send + Sync,
{
    Mapped {
        inner: key,
        map,
        _marker: PhantomData,
    }
}

impl<In, Out, K, F> ReadKey<Out> for Mapped<In, Out, K, F>
where
    K: ReadKey<In>,
    F: Fn(In) -> Out + Send + Sync,
{
    fn id(&self) -> KeyId {
        self.inner.id()
    }

    fn get(&self, binder: &dyn Binder) -> Result<Out, ReadError> {
        self.inner.get(binder).map(&self.map)
    }
}

/// Negates a boolean key.
pub fn not<K: ReadKey<bool>>(key: K) -> impl ReadKey<bool> {
    mapped(key, |value| !value)
}

/// Wraps read failures of the underlying key into the value itself.
pub struct Optional<T, K> {
    inner: K,
    _marker: PhantomData<fn() -> T>,
}

/// A read-only key whose `get` never errors: any failure from the base key is
/// encapsulated in the returned [`Maybe`]. Intended for tasks whose
/// dependencies may legitimately be absent.
pub fn optional<T, K: ReadKey<T>>(key: K) -> Optional<T, K> {
    Optional {
        inner: key,
        _marker: PhantomData,
    }
}

impl<T, K: ReadKey<T>> ReadKey<Maybe<T>> for Optional<T, K> {
    fn id(&self) -> KeyId {
        self.inner.id()
    }

    fn get(&self, binder: &dyn Binder) -> Result<Maybe<T>, ReadError> {
        Ok(Maybe::wrap(self.inner.get(binder)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::MapBinder;

    #[test]
    fn test_typed_round_trip() {
        let key = Key::<String>::new("greeting");
        let binder = MapBinder::new();
        binder.store(vec![key.bind("hello".to_string())]).unwrap();

        assert_eq!(key.get(&binder).unwrap(), "hello");
    }

    #[test]
    fn test_same_id_different_type_is_wrong_type() {
        let writer = Key::<String>::new("slot");
        let reader = Key::<i64>::new("slot");

        let binder = MapBinder::new();
        binder.store(vec![writer.bind("oops".to_string())]).unwrap();

        let err = reader.get(&binder).unwrap_err();
        assert!(err.is_wrong_type());
    }

    #[test]
    fn test_pending_and_absent_reads() {
        let key = Key::<i32>::new("value");
        let binder = MapBinder::new();

        assert!(key.get(&binder).unwrap_err().is_pending());

        binder.store(vec![key.bind_absent()]).unwrap();
        assert!(key.get(&binder).unwrap_err().is_absent());
    }

    #[test]
    fn test_presence_never_errors() {
        let key = Key::<i32>::new("value");
        let here = presence(key.clone());
        let binder = MapBinder::new();

        assert!(!here.get(&binder).unwrap());
        binder.store(vec![key.bind(3)]).unwrap();
        assert!(here.get(&binder).unwrap());
    }

    #[test]
    fn test_mapped_and_not() {
        let key = Key::<String>::new("word");
        let length = mapped(key.clone(), |word: String| word.len());
        let flag = Key::<bool>::new("flag");
        let negated = not(flag.clone());

        let binder = MapBinder::new();
        binder
            .store(vec![key.bind("four".to_string()), flag.bind(false)])
            .unwrap();

        assert_eq!(length.get(&binder).unwrap(), 4);
        assert!(negated.get(&binder).unwrap());
    }

    #[test]
    fn test_optional_wraps_errors() {
        let key = Key::<i32>::new("value");
        let opt = optional(key.clone());
        let binder = MapBinder::new();

        let pending = opt.get(&binder).unwrap();
        assert!(!pending.present());

        binder.store(vec![key.bind(9)]).unwrap();
        let present = opt.get(&binder).unwrap();
        assert_eq!(present.value(), Some(&9));
    }
}
