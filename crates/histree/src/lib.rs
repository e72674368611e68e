#![forbid(unsafe_code)]

//! Tree-structured, context-aware undo/redo framework.
//!
//! Application code registers reversible operations *as they execute*; the
//! framework replays them backwards (undo) or forwards (redo) without the
//! application serializing state transitions. Operations may contain
//! operations: every record carries a sub-context, and scoped controllers
//! route nested registrations into it, forming a history tree.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ Context (root)                                              │
//! │  stack: [⊥, "SetObject", "MergeObjects"]   present ──┐     │
//! │                              │                        ▼     │
//! │                              │            "MergeObjects"    │
//! │                              └── sub ──► ┌───────────────┐  │
//! │                                          │ Context (sub) │  │
//! │                                          │  [⊥, "Remove",│  │
//! │                                          │   "Remove",   │  │
//! │                                          │   "Set"]      │  │
//! │                                          └───────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! `⊥` is the sentinel slot at index 0; a cursor of 0 means "everything in
//! this context is undone".
//!
//! # Protocol
//!
//! A do-function pushes a record into the active context, then holds a
//! [`PushScope`] for the rest of its body; nested do-functions land their
//! records in the new record's sub-context. An undo-function holds a
//! [`PopScope`] and invokes the reverse operations, which dispatch through
//! the same sub-context stack. The process-wide [`gate`] silences the whole
//! machinery when disabled and carries the active-context pointer the
//! scopes swap.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use histree::{gate, Context, PopScope, PushScope};
//!
//! type Items = Arc<Mutex<Vec<i32>>>;
//!
//! fn add_item(items: &Items, value: i32) -> bool {
//!     let ctx = gate::context().expect("history context installed");
//!     ctx.push(
//!         "AddItem",
//!         { let items = Arc::clone(items); move || add_item(&items, value) },
//!         { let items = Arc::clone(items); move || add_item_undo(&items, value) },
//!     );
//!     let _scope = PushScope::new();
//!     items.lock().unwrap().push(value);
//!     true
//! }
//!
//! fn add_item_undo(items: &Items, _value: i32) -> bool {
//!     let _scope = PopScope::new();
//!     items.lock().unwrap().pop();
//!     true
//! }
//!
//! let items: Items = Arc::new(Mutex::new(Vec::new()));
//! let context = Context::new();
//! gate::set_context(Some(Arc::clone(&context)));
//!
//! add_item(&items, 7);
//! assert_eq!(*items.lock().unwrap(), vec![7]);
//!
//! assert!(context.undo());
//! assert!(items.lock().unwrap().is_empty());
//!
//! assert!(context.redo());
//! assert_eq!(*items.lock().unwrap(), vec![7]);
//! # gate::set_context(None);
//! ```
//!
//! # Module Structure
//!
//! - [`context`]: the record stack with its present cursor
//! - [`record`]: one reversible operation plus its memento store
//! - [`gate`]: process-wide recording switch and active-context pointer
//! - [`scope`]: RAII controllers bracketing do- and undo-bodies
//!
//! # Design Notes
//!
//! ## Why Records Store Closures
//!
//! A record must re-run its operation long after the original call frame is
//! gone, so do/undo bodies are captured as `move` closures owning copies of
//! their arguments. References are never retained.
//!
//! ## Why Replay Never Re-records
//!
//! While a context (or any ancestor) is undoing or redoing, `push` and
//! memento saves are no-ops. Do-functions can therefore call each other
//! freely from undo/redo bodies without spawning phantom history.
//!
//! ## Failure Signaling
//!
//! Every fallible operation reports in-band (`bool` or `Option`); the crate
//! raises no panics in library code and logs only diagnostics, never
//! errors, through `tracing`.

pub mod context;
pub mod gate;
mod memento;
pub mod record;
pub mod scope;

pub use context::Context;
pub use record::{OpFn, Record};
pub use scope::{PopScope, PushScope};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Mutex, MutexGuard, PoisonError};

    static WORLD: Mutex<()> = Mutex::new(());

    /// Serializes tests touching the process-wide gate or active-context
    /// pointer. Resets both on acquisition.
    pub(crate) fn world() -> MutexGuard<'static, ()> {
        let guard = WORLD.lock().unwrap_or_else(PoisonError::into_inner);
        crate::gate::enable();
        crate::gate::set_context(None);
        guard
    }
}
