// ABOUTME: The Binder trait and its map, overlay, and expose-filter implementations
// ABOUTME: Binders map key ids to bindings with at-most-once write semantics

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::binding::{BindStatus, Binding};
use super::error::BinderError;
use crate::key::KeyId;

/// Binder shared between the scheduler and concurrently running tasks.
pub type SharedBinder = Arc<dyn Binder>;

/// The state store for tasks in a graph. Safe for concurrent readers and
/// writers; a successful [`store`](Binder::store) happens-before any
/// [`get`](Binder::get) that observes the new binding.
pub trait Binder: Send + Sync {
    /// Add bindings to the binder. The batch is atomic: if any binding's id
    /// already has a stored binding (in any layer visible to this binder, or
    /// twice within the batch itself), nothing is committed and
    /// [`BinderError::DuplicateBinding`] names the offending id.
    fn store(&self, bindings: Vec<Binding>) -> Result<(), BinderError>;

    /// A previously stored binding, or a freshly synthesized pending binding
    /// when no binding with the given id has been stored.
    fn get(&self, id: &KeyId) -> Binding;

    /// Whether every given id has a stored (present or absent) binding. The
    /// answer is a snapshot and promises nothing once returned.
    fn has(&self, ids: &[KeyId]) -> bool;

    /// A snapshot of all stored bindings, in unspecified order.
    fn get_all(&self) -> Vec<Binding>;

    /// Register a sender that receives the id of every binding as it is
    /// stored. The scheduler uses this for per-key readiness signalling;
    /// senders whose receivers have gone away are dropped.
    fn watch(&self, sender: UnboundedSender<KeyId>);
}

impl std::fmt::Debug for dyn Binder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Binder")
    }
}

/// The plain binder: a lock-guarded map from key id to binding.
#[derive(Default)]
pub struct MapBinder {
    bindings: RwLock<HashMap<KeyId, Binding>>,
    watchers: Mutex<Vec<UnboundedSender<KeyId>>>,
}

impl MapBinder {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(&self, ids: &[KeyId]) {
        let mut watchers = self.watchers.lock().expect("binder watcher lock poisoned");
        if watchers.is_empty() {
            return;
        }
        watchers.retain(|sender| {
            for id in ids {
                if sender.send(id.clone()).is_err() {
                    return false;
                }
            }
            true
        });
    }
}

impl Binder for MapBinder {
    fn store(&self, bindings: Vec<Binding>) -> Result<(), BinderError> {
        let mut stored_ids = Vec::with_capacity(bindings.len());
        {
            let mut map = self.bindings.write().expect("binder lock poisoned");

            let mut batch_ids = HashSet::with_capacity(bindings.len());
            for binding in &bindings {
                if map.contains_key(binding.id()) || !batch_ids.insert(binding.id().clone()) {
                    return Err(BinderError::DuplicateBinding {
                        id: binding.id().clone(),
                    });
                }
            }

            for binding in bindings {
                stored_ids.push(binding.id().clone());
                map.insert(binding.id().clone(), binding);
            }
        }

        self.notify(&stored_ids);
        Ok(())
    }

    fn get(&self, id: &KeyId) -> Binding {
        let map = self.bindings.read().expect("binder lock poisoned");
        match map.get(id) {
            Some(binding) => binding.clone(),
            None => Binding::pending(id.clone()),
        }
    }

    fn has(&self, ids: &[KeyId]) -> bool {
        let map = self.bindings.read().expect("binder lock poisoned");
        ids.iter().all(|id| map.contains_key(id))
    }

    fn get_all(&self) -> Vec<Binding> {
        let map = self.bindings.read().expect("binder lock poisoned");
        map.values().cloned().collect()
    }

    fn watch(&self, sender: UnboundedSender<KeyId>) {
        self.watchers
            .lock()
            .expect("binder watcher lock poisoned")
            .push(sender);
    }
}

/// An overlay over an existing binder: newly stored bindings go to the overlay
/// only, while reads fall back to the base. Duplicates against either layer
/// are rejected.
pub struct OverlayBinder {
    base: SharedBinder,
    overlay: SharedBinder,
}

impl OverlayBinder {
    pub fn new(base: SharedBinder, overlay: SharedBinder) -> Self {
        Self { base, overlay }
    }
}

impl Binder for OverlayBinder {
    fn store(&self, bindings: Vec<Binding>) -> Result<(), BinderError> {
        for binding in &bindings {
            if self.base.has(std::slice::from_ref(binding.id())) {
                return Err(BinderError::DuplicateBinding {
                    id: binding.id().clone(),
                });
            }
        }
        self.overlay.store(bindings)
    }

    fn get(&self, id: &KeyId) -> Binding {
        let binding = self.overlay.get(id);
        if binding.status() != BindStatus::Pending {
            return binding;
        }
        self.base.get(id)
    }

    fn has(&self, ids: &[KeyId]) -> bool {
        ids.iter().all(|id| {
            let id = std::slice::from_ref(id);
            self.overlay.has(id) || self.base.has(id)
        })
    }

    fn get_all(&self) -> Vec<Binding> {
        let mut all = self.base.get_all();
        all.extend(self.overlay.get_all());
        all
    }

    fn watch(&self, sender: UnboundedSender<KeyId>) {
        self.base.watch(sender.clone());
        self.overlay.watch(sender);
    }
}

/// Runs a graph as a task within a parent graph. Bindings for keys in the
/// expose set are stored straight into the parent's binder, so dependent tasks
/// outside the sub-graph do not have to wait for every inner task to complete;
/// everything else stays in the internal store.
pub struct ExposeBinder {
    internal: SharedBinder,
    external: SharedBinder,
    expose: HashSet<KeyId>,
}

impl ExposeBinder {
    pub fn new(
        internal: SharedBinder,
        external: SharedBinder,
        expose: impl IntoIterator<Item = KeyId>,
    ) -> Self {
        Self {
            internal,
            external,
            expose: expose.into_iter().collect(),
        }
    }
}

impl Binder for ExposeBinder {
    fn store(&self, bindings: Vec<Binding>) -> Result<(), BinderError> {
        let mut exposed = Vec::new();
        let mut private = Vec::new();
        for binding in bindings {
            if self.expose.contains(binding.id()) {
                exposed.push(binding);
            } else {
                private.push(binding);
            }
        }

        // Check both routes before committing to either, so a duplicate in one
        // store cannot leave the other partially written.
        for binding in exposed.iter().chain(private.iter()) {
            if self.has(std::slice::from_ref(binding.id())) {
                return Err(BinderError::DuplicateBinding {
                    id: binding.id().clone(),
                });
            }
        }

        if !exposed.is_empty() {
            debug!(count = exposed.len(), "publishing exposed bindings to parent scope");
            self.external.store(exposed)?;
        }
        if !private.is_empty() {
            self.internal.store(private)?;
        }
        Ok(())
    }

    fn get(&self, id: &KeyId) -> Binding {
        let binding = self.internal.get(id);
        if binding.status() != BindStatus::Pending {
            return binding;
        }
        self.external.get(id)
    }

    fn has(&self, ids: &[KeyId]) -> bool {
        ids.iter().all(|id| {
            let id = std::slice::from_ref(id);
            self.internal.has(id) || self.external.has(id)
        })
    }

    fn get_all(&self) -> Vec<Binding> {
        let mut all = self.internal.get_all();
        all.extend(self.external.get_all());
        all
    }

    fn watch(&self, sender: UnboundedSender<KeyId>) {
        self.internal.watch(sender.clone());
        self.external.watch(sender);
    }
}
