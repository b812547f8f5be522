//! Dependency tracker: which derivation is currently evaluating.
//!
//! Reads of observable cells consult this to register dependencies
//! implicitly. The tracker is a thread-local save/restore stack rather than a
//! bare nullable slot: evaluation is re-entrant (a computed can evaluate
//! while a reaction's body is on the stack), and popping a frame must restore
//! the outer derivation instead of clearing the slot.
//!
//! Each frame also accumulates the cells read so far; the owning derivation
//! collects that map when evaluation finishes and diffs it against its
//! previous dependency set.

use std::cell::RefCell;

use indexmap::IndexMap;

use super::derivation::DerivationId;
use super::observable::{DependentSet, ObservableId};

thread_local! {
    static TRACKER_STACK: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

/// One in-flight evaluation: the derivation plus the cells it has read.
struct Frame {
    derivation: DerivationId,
    observed: IndexMap<ObservableId, DependentSet>,
}

/// RAII scope for one evaluation.
///
/// Entering pushes a frame; [`finish`](Self::finish) pops it and hands back
/// the observed reads. Dropping without `finish` (an unwinding evaluation
/// body) still pops, keeping the stack consistent.
pub struct DependencyTracker {
    derivation: DerivationId,
}

impl DependencyTracker {
    /// Make `derivation` the active derivation until the scope ends.
    pub(crate) fn enter(derivation: DerivationId) -> Self {
        TRACKER_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                derivation,
                observed: IndexMap::new(),
            });
        });

        Self { derivation }
    }

    /// The derivation currently being evaluated on this thread, if any.
    pub fn active() -> Option<DerivationId> {
        TRACKER_STACK.with(|stack| stack.borrow().last().map(|frame| frame.derivation))
    }

    /// Record that the active derivation read `cell`.
    ///
    /// Called by cells during [`read`](super::ObservableCell::read). Repeat
    /// reads of the same cell collapse into one entry.
    pub(crate) fn record_read(cell: ObservableId, dependents: DependentSet) {
        TRACKER_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                frame.observed.entry(cell).or_insert(dependents);
            }
        });
    }

    /// End the scope, returning every cell the evaluation read.
    pub(crate) fn finish(self) -> IndexMap<ObservableId, DependentSet> {
        let frame = TRACKER_STACK
            .with(|stack| stack.borrow_mut().pop())
            .expect("tracker stack underflow");
        debug_assert_eq!(
            frame.derivation, self.derivation,
            "tracker frame mismatch: expected {:?}, got {:?}",
            self.derivation, frame.derivation
        );
        std::mem::forget(self);
        frame.observed
    }
}

impl Drop for DependencyTracker {
    fn drop(&mut self) {
        // Unwind path: discard the frame so the outer derivation is restored.
        TRACKER_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
