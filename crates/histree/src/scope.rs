#![forbid(unsafe_code)]

//! Scoped controllers bracketing do- and undo-bodies.
//!
//! A do-function pushes its record, then constructs a [`PushScope`] whose
//! lifetime covers the rest of the body; an undo-function constructs a
//! [`PopScope`] first thing. Construction descends the active context into
//! the present record's sub-context so nested operations land their records
//! in the child stack; drop ascends and performs the cursor bookkeeping the
//! skipped push (under redo) or the outer undo (under undo) would have
//! done.
//!
//! Release lives in `Drop`, so it runs on every exit from the enclosing
//! body — early returns and unwinds included. Skipping it would leave the
//! process-wide active-context pointer stranded in a child stack.
//!
//! ```text
//! do-body                                   undo-body
//! ─────────────────────────────             ─────────────────────────────
//! ctx.push(label, do, undo)                 let _scope = PopScope::new();
//! let _scope = PushScope::new();  ──┐       reverse sub-operations…
//! nested sub-operations…            │ descend into present().sub
//! (scope drops: ascend, bookkeep) ◄─┘       (scope drops: ascend, retreat)
//! ```

use crate::gate;

/// RAII controller for a do-body.
///
/// `new` descends the active context into the present record's sub-context;
/// drop ascends and either advances a redoing parent's cursor (standing in
/// for the push that replay skipped) or notifies observers that a top-level
/// operation completed. Both ends are no-ops while the gate is locked and
/// while the active context is undoing — during undo, descent belongs to
/// the undo-body's [`PopScope`].
#[must_use = "the push scope must live for the remainder of the do-body"]
pub struct PushScope {
    active: bool,
}

impl PushScope {
    pub fn new() -> Self {
        let scope = Self { active: true };
        if gate::locked() {
            return scope;
        }
        let Some(ctx) = gate::context() else {
            return scope;
        };
        if ctx.is_undoing() {
            return scope;
        }
        if let Some(record) = ctx.present() {
            tracing::trace!(target: "histree.scope", id = record.id(), "push scope descends");
            gate::set_context(Some(record.sub_context()));
        }
        scope
    }

    /// Early, silent release for the abort protocol.
    ///
    /// Ascends without redo bookkeeping and without notifying observers,
    /// then disarms the guard so drop is a no-op. Call
    /// [`Context::abort_push`](crate::Context::abort_push) on the parent
    /// context immediately afterwards; the two steps belong together.
    pub fn abort(mut self) {
        if gate::locked() || !self.active {
            return;
        }
        self.active = false;
        let Some(ctx) = gate::context() else {
            return;
        };
        if ctx.is_undoing() {
            return;
        }
        tracing::trace!(target: "histree.scope", "push scope aborted");
        gate::set_context(ctx.parent());
    }

    fn release(&mut self) {
        if gate::locked() || !self.active {
            return;
        }
        let Some(ctx) = gate::context() else {
            return;
        };
        if ctx.is_undoing() {
            return;
        }
        tracing::trace!(target: "histree.scope", "push scope ascends");
        gate::set_context(ctx.parent());
        let Some(now) = gate::context() else {
            return;
        };
        if now.parent().is_some() && now.is_redoing() {
            // Replay skipped the nested push; move the cursor as it would have.
            now.advance_for_redo();
        } else if !now.is_redoing() {
            now.notify_stack_changed();
        }
        self.active = false;
    }
}

impl Default for PushScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PushScope {
    fn drop(&mut self) {
        self.release();
    }
}

/// RAII controller for an undo-body, symmetric to [`PushScope`].
///
/// `new` descends into the present record's sub-context; drop ascends and
/// retreats the cursor of the ascended-to context (floored at 1) when that
/// context is itself nested — propagating "one step undone" through the
/// layers.
#[must_use = "the pop scope must live for the remainder of the undo-body"]
pub struct PopScope {
    _private: (),
}

impl PopScope {
    pub fn new() -> Self {
        if !gate::locked() {
            if let Some(ctx) = gate::context() {
                if let Some(record) = ctx.present() {
                    tracing::trace!(target: "histree.scope", id = record.id(), "pop scope descends");
                    gate::set_context(Some(record.sub_context()));
                }
            }
        }
        Self { _private: () }
    }
}

impl Default for PopScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PopScope {
    fn drop(&mut self) {
        if gate::locked() {
            return;
        }
        let Some(ctx) = gate::context() else {
            return;
        };
        tracing::trace!(target: "histree.scope", "pop scope ascends");
        gate::set_context(ctx.parent());
        if let Some(now) = gate::context() {
            if now.parent().is_some() {
                now.retreat_for_undo();
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
