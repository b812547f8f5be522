//! Transactional write batching.
//!
//! A transaction defers propagation: each changed write inside the scope
//! records its direct dependents instead of starting a wave, and the
//! accumulated set is flushed through a single two-phase wave when the
//! outermost scope ends. A derivation dependent on several written cells is
//! therefore marked once and evaluated at most once, observing the final
//! value of every cell written in the scope.
//!
//! Nested transactions flatten into the outermost one: an inner scope ending
//! flushes nothing.

use std::cell::RefCell;

use indexmap::IndexSet;
use tracing::debug;

use super::derivation::DerivationId;
use super::error::ReactiveError;
use super::runtime::Runtime;

thread_local! {
    static COORDINATOR: RefCell<Coordinator> = RefCell::new(Coordinator::default());
}

#[derive(Default)]
struct Coordinator {
    depth: usize,
    pending: IndexSet<DerivationId>,
}

/// True while a transaction scope is open on this thread.
pub fn in_transaction() -> bool {
    COORDINATOR.with(|coordinator| coordinator.borrow().depth > 0)
}

/// Queue the direct dependents of a changed write if a transaction is open.
///
/// Returns `false` outside a transaction, in which case the caller
/// propagates immediately.
pub(crate) fn defer(dependents: &[DerivationId]) -> bool {
    COORDINATOR.with(|coordinator| {
        let mut coordinator = coordinator.borrow_mut();
        if coordinator.depth == 0 {
            return false;
        }
        coordinator.pending.extend(dependents.iter().copied());
        true
    })
}

/// Run `f` with every write inside it batched into one propagation wave.
///
/// The wave runs after `f` returns, over the union of the direct dependents
/// of every changed cell. Nested calls flatten: only the outermost one
/// flushes. A panic inside `f` discards the pending work (the wave is
/// abandoned, never half-run).
pub fn run_transaction<F>(f: F) -> Result<(), ReactiveError>
where
    F: FnOnce(),
{
    let outermost = COORDINATOR.with(|coordinator| {
        let mut coordinator = coordinator.borrow_mut();
        coordinator.depth += 1;
        coordinator.depth == 1
    });

    let guard = ScopeGuard { outermost };
    f();
    drop(guard);

    if !outermost {
        return Ok(());
    }

    let pending: Vec<DerivationId> =
        COORDINATOR.with(|coordinator| coordinator.borrow_mut().pending.drain(..).collect());
    if pending.is_empty() {
        return Ok(());
    }
    debug!(dependents = pending.len(), "transaction flush");
    Runtime::propagate(&pending)
}

/// Closes the scope on both the normal and the unwinding path.
struct ScopeGuard {
    outermost: bool,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        COORDINATOR.with(|coordinator| {
            let mut coordinator = coordinator.borrow_mut();
            coordinator.depth -= 1;
            if self.outermost && std::thread::panicking() {
                coordinator.pending.clear();
            }
        });
    }
}
