#![forbid(unsafe_code)]

//! Keyed auxiliary storage attached to each record.
//!
//! A do-body saves whatever its undo-body will need (the erased value, the
//! previous mapping) under a string key during the natural first execution;
//! undo and redo bodies load it back by key. Values are type-erased behind
//! `dyn Any` with a runtime type check on the way out, so a mismatched load
//! reports `None` instead of reinterpreting the slot.
//!
//! Phase rules (save only outside replay, load only during replay) belong
//! to [`Record`](crate::Record); this store is the dumb container.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

type Slot = Box<dyn Any + Send + Sync>;

pub(crate) struct MementoStore {
    slots: Mutex<HashMap<String, Slot>>,
}

impl MementoStore {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Store `value` under `key`, silently overwriting any previous slot.
    pub(crate) fn save<T: Any + Send + Sync>(&self, key: &str, value: T) {
        self.lock().insert(key.to_string(), Box::new(value));
    }

    /// Clone a previously saved value out.
    ///
    /// `None` when the key is absent or the stored value is not a `T`; the
    /// slot itself is left intact either way.
    pub(crate) fn load<T: Any + Clone>(&self, key: &str) -> Option<T> {
        let slots = self.lock();
        slots.get(canonical_key(key))?.downcast_ref::<T>().cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A do-function saving under key K and an undo-function loading under
/// K + "_Undo" must reach the same slot: the requested key is truncated at
/// the first `"_Undo"` occurrence before lookup. Saves store the raw key.
fn canonical_key(key: &str) -> &str {
    match key.find("_Undo") {
        Some(at) => &key[..at],
        None => key,
    }
}

// ============================================================================
// Tests
// ============================================================================
