// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Generation-checked identity tokens.

Shaders, programs and pipelines that take part in live reload get a key into an [`Arena`].  The
arena holds the object only while its owners do: the owner handle carries a [`Registration`]
that vacates the slot when the last owner goes away.  A key that outlived its object resolves to
`None`, and a recycled slot never resolves through an old key because slotmap checks the
generation.
*/

use slotmap::{Key, SlotMap};
use std::sync::{Arc, OnceLock};

slotmap::new_key_type! {
    /// Identity token of a watched shader.
    pub struct ShaderKey;
    /// Identity token of a watched program.
    pub struct ProgramKey;
    /// Identity token of a watched pipeline.
    pub struct PipelineKey;
}

pub(crate) struct Arena<K: Key, T> {
    slots: wasm_safe_mutex::Mutex<SlotMap<K, Arc<T>>>,
}

impl<K: Key, T> Arena<K, T> {
    pub(crate) fn new() -> Self {
        Arena {
            slots: wasm_safe_mutex::Mutex::new(SlotMap::with_key()),
        }
    }

    pub(crate) fn insert(&self, value: Arc<T>) -> K {
        self.slots.lock_sync().insert(value)
    }

    pub(crate) fn resolve(&self, key: K) -> Option<Arc<T>> {
        self.slots.lock_sync().get(key).cloned()
    }

    pub(crate) fn vacate(&self, key: K) -> bool {
        let removed = self.slots.lock_sync().remove(key);
        //dropped outside the lock
        removed.is_some()
    }

    /// Number of live objects.
    pub(crate) fn len(&self) -> usize {
        self.slots.lock_sync().len()
    }
}

/// Keeps an object's slot occupied until dropped.
pub(crate) struct Registration<K: Key, T> {
    arena: Arc<Arena<K, T>>,
    key: K,
}

impl<K: Key, T> Drop for Registration<K, T> {
    fn drop(&mut self) {
        self.arena.vacate(self.key);
    }
}

/// Where an owner handle keeps its registration.  An object joins at most one arena.
pub(crate) struct WatchSlot<K: Key, T>(OnceLock<Registration<K, T>>);

impl<K: Key, T> WatchSlot<K, T> {
    pub(crate) const fn new() -> Self {
        WatchSlot(OnceLock::new())
    }

    /**
    Registers `value` with `arena`, or returns the existing key.

    Returns `None` when the object is already registered with a different arena.
    */
    pub(crate) fn register(&self, arena: &Arc<Arena<K, T>>, value: impl FnOnce() -> Arc<T>) -> Option<K> {
        let registration = self.0.get_or_init(|| Registration {
            arena: arena.clone(),
            key: arena.insert(value()),
        });
        Arc::ptr_eq(&registration.arena, arena).then_some(registration.key)
    }

    pub(crate) fn key(&self) -> Option<K> {
        self.0.get().map(|r| r.key)
    }
}

impl<K: Key, T> std::fmt::Debug for WatchSlot<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WatchSlot").field(&self.key()).finish()
    }
}
