#![forbid(unsafe_code)]

//! History contexts: ordered record stacks with a present cursor.
//!
//! A [`Context`] is one node of the history tree. Index 0 of its stack is a
//! sentinel that is never executed; real records occupy indices 1..N. The
//! `present` cursor marks the most recently applied record, 0 meaning
//! "everything in this context is undone".
//!
//! ```text
//! push(d), push(e) after two undos — the redo tail is truncated first
//! ┌──────────────────────────────────────────────┐
//! │ stack: [⊥, a, b, c]      present = 1 (a)     │
//! │ push(d) ──► [⊥, a, d]    present = 2 (d)     │
//! │ push(e) ──► [⊥, a, d, e] present = 3 (e)     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! 1. `0 <= present <= stack.len() - 1` after every public operation.
//! 2. Records strictly above `present` form the redo tail; any `push`
//!    destroys it.
//! 3. A context counts as undoing/redoing iff it *or any ancestor* has the
//!    corresponding flag set.
//! 4. The undo/redo flag-and-cursor ordering is part of the contract: undo
//!    runs the body, then decrements, then clears its flag; redo increments,
//!    then runs the body, then clears. Scoped controllers inside the bodies
//!    rely on observing mid-execution cursors.
//!
//! # Concurrency
//!
//! `undo` and `redo` serialize on a per-context operation mutex held for
//! the whole body. Stack state lives behind its own short-lived lock so the
//! body's nested scope transitions can read and move cursors (their own and
//! other contexts') without deadlocking.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::gate;
use crate::record::Record;

type Observer = Arc<dyn Fn(usize) + Send + Sync>;

struct Stack {
    records: Vec<Arc<Record>>,
    present: usize,
}

/// A node in the history tree: a stack of records plus the present cursor.
pub struct Context {
    stack: Mutex<Stack>,
    undoing: AtomicBool,
    redoing: AtomicBool,
    /// Back-pointer to the context whose current record owns this one.
    /// Never owned: ownership flows parent → record → sub-context.
    parent: Weak<Context>,
    observer: Mutex<Option<Observer>>,
    /// Serializes undo and redo on this context.
    op_lock: Mutex<()>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stack = self.lock_stack();
        f.debug_struct("Context")
            .field("depth", &(stack.records.len() - 1))
            .field("present", &stack.present)
            .field("undoing", &self.undoing.load(Ordering::Relaxed))
            .field("redoing", &self.redoing.load(Ordering::Relaxed))
            .finish()
    }
}

impl Context {
    /// Create a root context.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_parent(Weak::new())
    }

    pub(crate) fn with_parent(parent: Weak<Context>) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Context>| Self {
            stack: Mutex::new(Stack {
                records: vec![Arc::new(Record::sentinel(me.clone()))],
                present: 0,
            }),
            undoing: AtomicBool::new(false),
            redoing: AtomicBool::new(false),
            parent,
            observer: Mutex::new(None),
            op_lock: Mutex::new(()),
        })
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Append a new record and advance the cursor, destroying the redo tail.
    ///
    /// The closures own by-value copies of everything the operation needs;
    /// `do_fn` is not called here — it is stored for future redos. No-op
    /// while the gate is locked or while this context (or any ancestor) is
    /// undoing or redoing, so replay never re-records. Observers are not
    /// notified: completion is signaled by the push scope's release.
    pub fn push<D, U>(self: &Arc<Self>, label: impl Into<String>, do_fn: D, undo_fn: U)
    where
        D: Fn() -> bool + Send + Sync + 'static,
        U: Fn() -> bool + Send + Sync + 'static,
    {
        if gate::locked() {
            return;
        }
        if self.is_undoing_or_redoing() {
            return;
        }

        let record = Arc::new(Record::new(
            Arc::downgrade(self),
            label.into(),
            Box::new(do_fn),
            Box::new(undo_fn),
        ));
        let mut stack = self.lock_stack();
        stack.present += 1;
        let present = stack.present;
        stack.records.truncate(present);
        tracing::trace!(
            target: "histree.context",
            label = %record.label(),
            id = record.id(),
            present = stack.present,
            "record pushed"
        );
        stack.records.push(record);
    }

    /// Remove the record just pushed and retreat the cursor.
    ///
    /// Used by a do-body that decided the operation changed nothing
    /// observable; see the abort protocol on
    /// [`PushScope::abort`](crate::PushScope::abort). No-op under the same
    /// conditions as [`push`](Self::push) and when nothing has been pushed.
    /// Observers are not notified.
    pub fn abort_push(&self) {
        if gate::locked() {
            return;
        }
        if self.is_undoing_or_redoing() {
            return;
        }
        let mut stack = self.lock_stack();
        if stack.present == 0 {
            return;
        }
        stack.present -= 1;
        let record = stack.records.pop();
        tracing::trace!(
            target: "histree.context",
            id = record.map(|r| r.id()).unwrap_or_default(),
            present = stack.present,
            "push aborted"
        );
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Revert the present record, retreating the cursor.
    ///
    /// Returns the undo-closure's result; false when the gate is locked or
    /// everything is already undone.
    pub fn undo(&self) -> bool {
        if gate::locked() {
            return false;
        }
        let _op = self.lock_op();

        let record = {
            let stack = self.lock_stack();
            if stack.present == 0 {
                return false;
            }
            Arc::clone(&stack.records[stack.present])
        };

        self.undoing.store(true, Ordering::Relaxed);
        let result = record.run_undo();
        let present = {
            let mut stack = self.lock_stack();
            stack.present -= 1;
            stack.present
        };
        self.undoing.store(false, Ordering::Relaxed);

        tracing::debug!(
            target: "histree.context",
            label = %record.label(),
            id = record.id(),
            present,
            result,
            "undo"
        );
        self.notify(present);
        result
    }

    /// Re-apply the first record of the redo tail, advancing the cursor.
    ///
    /// Returns the do-closure's result; false when the gate is locked or
    /// there is nothing to redo. The cursor is advanced *before* the body
    /// runs: scoped controllers inside it locate the record being redone
    /// through the cursor.
    pub fn redo(&self) -> bool {
        if gate::locked() {
            return false;
        }
        let _op = self.lock_op();

        let record = {
            let mut stack = self.lock_stack();
            if stack.present + 1 == stack.records.len() {
                return false;
            }
            self.redoing.store(true, Ordering::Relaxed);
            stack.present += 1;
            Arc::clone(&stack.records[stack.present])
        };

        let result = record.run_do();
        self.redoing.store(false, Ordering::Relaxed);

        // Nested scope releases may have advanced the cursor further.
        let present = self.lock_stack().present;
        tracing::debug!(
            target: "histree.context",
            label = %record.label(),
            id = record.id(),
            present,
            result,
            "redo"
        );
        self.notify(present);
        result
    }

    // ========================================================================
    // Phase queries (ancestor-aware)
    // ========================================================================

    /// True while this context or any ancestor is inside `undo`.
    #[must_use]
    pub fn is_undoing(&self) -> bool {
        self.any_up(|ctx| ctx.undoing.load(Ordering::Relaxed))
    }

    /// True while this context or any ancestor is inside `redo`.
    #[must_use]
    pub fn is_redoing(&self) -> bool {
        self.any_up(|ctx| ctx.redoing.load(Ordering::Relaxed))
    }

    /// True while any replay is in progress anywhere up the parent chain.
    #[must_use]
    pub fn is_undoing_or_redoing(&self) -> bool {
        self.is_undoing() || self.is_redoing()
    }

    fn any_up(&self, flag: fn(&Context) -> bool) -> bool {
        if flag(self) {
            return true;
        }
        // Raw parent walk: phase queries are not gate-guarded, and weak
        // upgrades failing during teardown simply end the walk.
        let mut current = self.parent.upgrade();
        while let Some(ctx) = current {
            if flag(&ctx) {
                return true;
            }
            current = ctx.parent.upgrade();
        }
        false
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The record at the cursor; the sentinel when everything is undone.
    /// `None` while the gate is locked.
    #[must_use]
    pub fn present(&self) -> Option<Arc<Record>> {
        if gate::locked() {
            return None;
        }
        let stack = self.lock_stack();
        Some(Arc::clone(&stack.records[stack.present]))
    }

    /// The record that would become present after a redo, if any.
    /// `None` while the gate is locked.
    #[must_use]
    pub fn peek_future(&self) -> Option<Arc<Record>> {
        if gate::locked() {
            return None;
        }
        let stack = self.lock_stack();
        stack.records.get(stack.present + 1).map(Arc::clone)
    }

    /// The context whose current record owns this one. `None` on the root
    /// and while the gate is locked.
    #[must_use]
    pub fn parent(&self) -> Option<Arc<Context>> {
        if gate::locked() {
            return None;
        }
        self.parent.upgrade()
    }

    /// Read-only snapshot of the stack, sentinel included.
    #[must_use]
    pub fn stack_view(&self) -> Vec<Arc<Record>> {
        self.lock_stack().records.clone()
    }

    /// The raw cursor. Like [`stack_view`](Self::stack_view), not
    /// gate-guarded.
    #[must_use]
    pub fn present_index(&self) -> usize {
        self.lock_stack().present
    }

    /// Debug rendering of the stack, newest first, marking the present
    /// record and recursing into sub-contexts with one extra tab.
    #[must_use]
    pub fn dump(&self, indent: usize) -> String {
        let (records, present) = {
            let stack = self.lock_stack();
            (stack.records.clone(), stack.present)
        };
        let tabs = "\t".repeat(indent);
        let mut out = String::new();
        for (index, record) in records.iter().enumerate().skip(1).rev() {
            out.push_str(&tabs);
            out.push_str(record.label());
            if index == present {
                out.push_str(" <<<");
            }
            out.push('\n');
            if let Some(sub) = record.sub_if_built() {
                out.push_str(&sub.dump(indent + 1));
            }
        }
        out
    }

    // ========================================================================
    // Observer
    // ========================================================================

    /// Bind the single stack-change observer, replacing any previous one.
    /// It fires with the new cursor after undo, redo, clear, and top-level
    /// push completion. No-op while the gate is locked.
    pub fn bind_on_stack_changed<F>(&self, observer: F)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        if gate::locked() {
            return;
        }
        *self.lock_observer() = Some(Arc::new(observer));
    }

    /// Drop the stack-change observer.
    pub fn unbind_on_stack_changed(&self) {
        *self.lock_observer() = None;
    }

    fn notify(&self, present: usize) {
        let observer = self.lock_observer().clone();
        if let Some(observer) = observer {
            observer(present);
        }
    }

    /// Fire the observer with the current cursor. Used by the push scope on
    /// top-level completion.
    pub(crate) fn notify_stack_changed(&self) {
        let present = self.lock_stack().present;
        self.notify(present);
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Reset the stack to a single sentinel and fire the observer with 0.
    /// No-op while the gate is locked.
    pub fn clear(self: &Arc<Self>) {
        if gate::locked() {
            return;
        }
        {
            let mut stack = self.lock_stack();
            stack.records = vec![Arc::new(Record::sentinel(Arc::downgrade(self)))];
            stack.present = 0;
        }
        tracing::debug!(target: "histree.context", "stack cleared");
        self.notify(0);
    }

    // ========================================================================
    // Scope bookkeeping
    // ========================================================================

    /// Cursor advance performed on a redoing ancestor's behalf: a normal
    /// push is skipped during redo, so the scope release moves the cursor
    /// the way that push would have. Clamped to the stack top.
    pub(crate) fn advance_for_redo(&self) {
        let mut stack = self.lock_stack();
        if stack.present + 1 < stack.records.len() {
            stack.present += 1;
        }
    }

    /// Cursor retreat performed while an undo unwinds nested records.
    /// Floors at 1: the resting value a later redo descends through.
    pub(crate) fn retreat_for_undo(&self) {
        let mut stack = self.lock_stack();
        if stack.present > 1 {
            stack.present -= 1;
        }
    }

    fn lock_stack(&self) -> MutexGuard<'_, Stack> {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observer(&self) -> MutexGuard<'_, Option<Observer>> {
        self.observer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_op(&self) -> MutexGuard<'_, ()> {
        self.op_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Tests
// ============================================================================
