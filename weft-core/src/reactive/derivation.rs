//! Derivation bookkeeping and the stale/ready notification protocol.
//!
//! A derivation is anything that evaluates in response to observable changes:
//! a [`Reaction`](super::Reaction) (side effect, no produced value) or a
//! [`ComputedCell`](super::ComputedCell) (cached derived value). Derivations
//! never subscribe explicitly; reading a cell during evaluation registers the
//! dependency implicitly.
//!
//! # The Two-Phase Protocol
//!
//! A single write may reach one derivation along several paths (a diamond:
//! two computed cells both deriving from the same observable). Recomputing
//! eagerly per edge risks a glitch, where the derivation observes one path
//! updated and the other stale. Propagation therefore runs in two phases:
//!
//! 1. Mark-stale: every derivation reachable from the changed cells has its
//!    stale count incremented, once per incoming edge, across the whole
//!    affected subgraph.
//!
//! 2. Send-ready: each notification edge resolves, carrying whether the
//!    upstream value actually changed. A derivation recomputes only when its
//!    count returns to zero with at least one changed path; it discards the
//!    wave silently when every path settled without a change.
//!
//! By the time a derivation's count reaches zero, every one of its inputs has
//! settled to its final value for the wave.
//!
//! # Dependency Diffing
//!
//! Dependency graphs are conditional: a branch can change which cells an
//! evaluation reads. After each evaluation the derivation diffs the cells it
//! just read against its previous dependency set and unsubscribes from the
//! cells it no longer reads. Without this pruning a derivation keeps
//! receiving notifications for paths it no longer executes, which corrupts
//! future stale-count accounting and grows dependent sets without bound.
//! Reconciliation runs strictly after the evaluation body returns, never
//! interleaved with an in-flight wave's counting.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::trace;

use super::error::ReactiveError;
use super::observable::{DependentSet, ObservableId};
use super::tracker::DependencyTracker;

/// Unique identifier for a derivation.
///
/// Dependent sets store these ids rather than references; the runtime
/// registry resolves them back to live derivations at propagation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivationId(u64);

impl DerivationId {
    /// Generate a new unique derivation ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for DerivationId {
    fn default() -> Self {
        Self::new()
    }
}

/// An evaluatable unit participating in propagation waves.
///
/// The default `mark_stale`/`send_ready` methods implement the counting
/// protocol on top of the shared [`DerivationCore`]; implementors supply the
/// core and the evaluation body. [`ComputedCell`](super::ComputedCell)
/// overrides `mark_stale` to forward the notification downstream eagerly.
pub trait Derivation: Send + Sync {
    /// The shared protocol bookkeeping.
    fn core(&self) -> &DerivationCore;

    /// Run the evaluation body, re-discovering dependencies as it reads.
    fn evaluate(&self) -> Result<(), ReactiveError>;

    fn id(&self) -> DerivationId {
        self.core().id()
    }

    /// Phase 1: one more upstream path is settling this wave.
    fn mark_stale(&self) {
        self.core().mark_stale();
    }

    /// Phase 2: one upstream path settled, `changed` reporting whether its
    /// value actually moved. Evaluates when the last outstanding path
    /// resolves and at least one path changed.
    fn send_ready(&self, changed: bool) -> Result<(), ReactiveError> {
        if self.core().absorb_ready(changed) {
            self.evaluate()
        } else {
            Ok(())
        }
    }
}

/// Protocol state shared by every derivation kind.
pub struct DerivationCore {
    id: DerivationId,

    /// Outstanding upstream notifications awaited in the current wave.
    stale_count: AtomicU32,

    /// Whether any settled path reported an actual value change.
    value_changed: AtomicBool,

    /// Set while the evaluation body is on the stack; re-entry is a cycle.
    evaluating: AtomicBool,

    /// Cells read by the previous evaluation, each paired with a handle to
    /// its dependents set so pruning does not need the cell's value type.
    dependencies: RwLock<IndexMap<ObservableId, DependentSet>>,
}

impl DerivationCore {
    pub fn new() -> Self {
        Self {
            id: DerivationId::new(),
            stale_count: AtomicU32::new(0),
            value_changed: AtomicBool::new(false),
            evaluating: AtomicBool::new(false),
            dependencies: RwLock::new(IndexMap::new()),
        }
    }

    pub fn id(&self) -> DerivationId {
        self.id
    }

    /// Outstanding upstream notifications in the current wave.
    pub fn stale_count(&self) -> u32 {
        self.stale_count.load(Ordering::SeqCst)
    }

    /// Number of cells the previous evaluation read.
    pub fn dependency_count(&self) -> usize {
        self.dependencies.read().len()
    }

    pub(crate) fn mark_stale(&self) {
        self.stale_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Absorb one ready notification; returns whether the derivation should
    /// evaluate now. Resets the change flag when it does.
    pub(crate) fn absorb_ready(&self, changed: bool) -> bool {
        let pending = self.stale_count.load(Ordering::SeqCst);
        if pending > 0 {
            self.stale_count.store(pending - 1, Ordering::SeqCst);
        }
        // pending == 0: this ready edge has no matching mark because the
        // subscription was formed while the wave was already in flight. The
        // notification still settles the derivation below rather than
        // driving the counter negative.
        if changed {
            self.value_changed.store(true, Ordering::SeqCst);
        }
        if self.stale_count.load(Ordering::SeqCst) == 0 {
            self.value_changed.swap(false, Ordering::SeqCst)
        } else {
            false
        }
    }

    /// Run `body` as this derivation's evaluation: guard against re-entrant
    /// self-evaluation, track reads through the [`DependencyTracker`], and
    /// reconcile the dependency set afterwards.
    ///
    /// Reconciliation is skipped when the body fails; the abandoned wave
    /// leaves the previous dependency set in place.
    pub(crate) fn evaluate_with(
        &self,
        body: impl FnOnce() -> Result<(), ReactiveError>,
    ) -> Result<(), ReactiveError> {
        if self.evaluating.swap(true, Ordering::SeqCst) {
            return Err(ReactiveError::CycleDetected(self.id));
        }
        let _reset = ClearOnDrop(&self.evaluating);

        trace!(derivation = ?self.id, "evaluate");
        let scope = DependencyTracker::enter(self.id);
        let result = body();
        let observed = scope.finish();

        if result.is_ok() {
            self.reconcile(observed);
        }
        result
    }

    /// Diff the cells just read against the previous dependency set and
    /// unsubscribe from the ones no longer read. Newly read cells already
    /// added this derivation to their dependents during the read itself.
    fn reconcile(&self, observed: IndexMap<ObservableId, DependentSet>) {
        let mut dependencies = self.dependencies.write();
        for (cell, dependents) in dependencies.iter() {
            if !observed.contains_key(cell) {
                dependents.write().swap_remove(&self.id);
            }
        }
        *dependencies = observed;
    }
}

impl Default for DerivationCore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DerivationCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivationCore")
            .field("id", &self.id)
            .field("stale_count", &self.stale_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Clears the evaluating flag even when the body unwinds.
struct ClearOnDrop<'a>(&'a AtomicBool);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
