#![forbid(unsafe_code)]

//! Process-wide recording gate and active-context pointer.
//!
//! Two pieces of global state drive the whole framework:
//!
//! - the **active context**: the [`Context`] that currently receives `push`
//!   calls, swapped by [`PushScope`](crate::PushScope) and
//!   [`PopScope`](crate::PopScope) as nested operations begin and end;
//! - the **lock**: while set, every recording and playback operation in the
//!   crate degrades to a no-op returning a neutral value, so hosts can run
//!   bulk loads or internal edits without branching at each call site.
//!
//! Reads dominate writes by orders of magnitude (every push, save, load and
//! scope transition consults both), so the context pointer lives in an
//! [`ArcSwapOption`] for wait-free loads and the lock in an [`AtomicBool`].
//!
//! Both are intended to be driven from a single thread; swapping contexts
//! from several threads at once is outside the contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::context::Context;

static ACTIVE_CONTEXT: ArcSwapOption<Context> = ArcSwapOption::const_empty();
static LOCKED: AtomicBool = AtomicBool::new(false);

/// Install `context` as the active context.
///
/// Hosts call this once at startup with their root context; the scoped
/// controllers call it on every descent and ascent.
pub fn set_context(context: Option<Arc<Context>>) {
    ACTIVE_CONTEXT.store(context);
}

/// The context currently receiving `push` calls, if any.
#[must_use]
pub fn context() -> Option<Arc<Context>> {
    ACTIVE_CONTEXT.load_full()
}

/// Ascend from the active context to the root of its history tree.
///
/// While the gate is locked the parent walk is cut short and the active
/// context itself is returned.
#[must_use]
pub fn root_context() -> Option<Arc<Context>> {
    let mut ctx = context()?;
    while let Some(parent) = ctx.parent() {
        ctx = parent;
    }
    Some(ctx)
}

/// Silence every recording and playback operation until [`enable`] runs.
pub fn disable() {
    LOCKED.store(true, Ordering::Relaxed);
    tracing::debug!(target: "histree.gate", "recording disabled");
}

/// Lift the silence imposed by [`disable`].
pub fn enable() {
    LOCKED.store(false, Ordering::Relaxed);
    tracing::debug!(target: "histree.gate", "recording enabled");
}

pub(crate) fn locked() -> bool {
    LOCKED.load(Ordering::Relaxed)
}

// ============================================================================
// Tests
// ============================================================================
