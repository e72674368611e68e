#![forbid(unsafe_code)]

//! Reversible operation records.
//!
//! A [`Record`] is one entry on a context's stack: a label and id for
//! display, the do/undo closures with their captured arguments, a keyed
//! memento store, and the sub-context that receives records pushed while
//! this record's do-body ran.
//!
//! # Invariants
//!
//! - The closures are never invoked while the process-wide gate is locked.
//! - `save` succeeds only during the natural first execution; `load`
//!   succeeds only during undo or redo (both checks are ancestor-aware).
//! - Arguments travel inside the closures as by-value captures; a record
//!   never borrows host state.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crate::context::Context;
use crate::gate;
use crate::memento::MementoStore;

/// Boxed operation body: invoked with no arguments (captures travel inside
/// the closure) and reports success as `bool`.
pub type OpFn = Box<dyn Fn() -> bool + Send + Sync>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// One reversible operation on a context stack.
pub struct Record {
    label: String,
    id: u64,
    do_fn: OpFn,
    undo_fn: OpFn,
    mementos: MementoStore,
    /// Context that owns this record; parent of the lazily-built sub-context.
    owner: Weak<Context>,
    sub: OnceLock<Arc<Context>>,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("label", &self.label)
            .field("id", &self.id)
            .field("mementos", &self.mementos.len())
            .field("has_sub", &self.sub.get().is_some())
            .finish()
    }
}

impl Record {
    pub(crate) fn new(owner: Weak<Context>, label: String, do_fn: OpFn, undo_fn: OpFn) -> Self {
        Self {
            label,
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            do_fn,
            undo_fn,
            mementos: MementoStore::new(),
            owner,
            sub: OnceLock::new(),
        }
    }

    /// The "before-first" slot at stack index 0. Its closures are never run;
    /// it exists so a fully-undone context still has a present record.
    pub(crate) fn sentinel(owner: Weak<Context>) -> Self {
        Self {
            label: String::new(),
            id: 0,
            do_fn: Box::new(|| true),
            undo_fn: Box::new(|| true),
            mementos: MementoStore::new(),
            owner,
            sub: OnceLock::new(),
        }
    }

    // ========================================================================
    // Mementos
    // ========================================================================

    /// Store `value` under `key` for later replay.
    ///
    /// Returns false while the gate is locked or while this record's
    /// sub-context (or any ancestor) is undoing or redoing: saves belong to
    /// the natural first execution only.
    pub fn save<T: Any + Send + Sync>(&self, key: &str, value: T) -> bool {
        if gate::locked() {
            return false;
        }
        if self.sub_context().is_undoing_or_redoing() {
            return false;
        }
        self.mementos.save(key, value);
        tracing::trace!(target: "histree.record", id = self.id, key = %key, "memento saved");
        true
    }

    /// Retrieve a value saved during the first execution.
    ///
    /// Only meaningful during replay: returns `None` while the gate is
    /// locked, outside undo/redo, on a missing key, or when the stored
    /// value is not a `T`. A `"_Undo"` suffix in `key` is stripped before
    /// lookup so undo-bodies address the slot their do-body saved.
    #[must_use]
    pub fn load<T: Any + Clone>(&self, key: &str) -> Option<T> {
        if gate::locked() {
            return None;
        }
        if !self.sub_context().is_undoing_or_redoing() {
            return None;
        }
        self.mementos.load(key)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Human-readable tag, for display and [`Context::dump`].
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Process-unique id; 0 for the sentinel.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The context holding records produced while this record's do-body ran.
    ///
    /// Built lazily on first access; the laziness also keeps the sentinel
    /// from recursing into an infinite chain of sub-contexts.
    pub fn sub_context(&self) -> Arc<Context> {
        Arc::clone(
            self.sub
                .get_or_init(|| Context::with_parent(self.owner.clone())),
        )
    }

    pub(crate) fn sub_if_built(&self) -> Option<Arc<Context>> {
        self.sub.get().map(Arc::clone)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    pub(crate) fn run_do(&self) -> bool {
        (self.do_fn)()
    }

    pub(crate) fn run_undo(&self) -> bool {
        (self.undo_fn)()
    }
}

// ============================================================================
// Tests
// ============================================================================
