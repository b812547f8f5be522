//! Observable cells.
//!
//! An `ObservableCell` is the fundamental reactive primitive: a mutable value
//! with a set of dependent derivations.
//!
//! # How Cells Work
//!
//! 1. When a cell is read while a derivation is evaluating, the cell adds
//!    that derivation to its dependents and reports the read to the
//!    [`DependencyTracker`].
//!
//! 2. When a cell's value changes, a propagation wave runs over a snapshot of
//!    its dependents (or is deferred to the end of the enclosing
//!    transaction).
//!
//! 3. Whether a write counts as a change is decided by the cell's equality
//!    predicate. The default is `PartialEq`; [`with_eq`](ObservableCell::with_eq)
//!    installs a custom predicate. Writing an equal value is a no-op: the
//!    value is stored, but no dependent evaluates.
//!
//! Dependents are only ever removed by dependency reconciliation (see the
//! [`derivation`](super::derivation) module); there is no external
//! unsubscribe.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::trace;

use super::derivation::DerivationId;
use super::error::ReactiveError;
use super::runtime::Runtime;
use super::tracker::DependencyTracker;

/// Unique identifier for an observable cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservableId(u64);

impl ObservableId {
    /// Generate a new unique cell ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ObservableId {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to a cell's dependents.
///
/// Derivations keep a clone per dependency so reconciliation can prune
/// without knowing the cell's value type.
pub(crate) type DependentSet = Arc<RwLock<IndexSet<DerivationId>>>;

/// Snapshot of dependent ids taken at a wave boundary.
pub(crate) type DependentSnapshot = SmallVec<[DerivationId; 8]>;

/// A reactive value cell.
///
/// `Clone` shares identity and state, so a cell can be captured by any number
/// of reaction and computed closures.
///
/// # Example
///
/// ```rust,ignore
/// let count = ObservableCell::new(0);
///
/// // Read the value (registers a dependency inside an evaluation).
/// let value = count.read();
///
/// // Update the value (propagates to dependents when it changed).
/// count.write(5)?;
/// ```
pub struct ObservableCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unique identifier for this cell.
    id: ObservableId,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// Derivations whose most recent evaluation read this cell.
    dependents: DependentSet,

    /// Decides whether a write counts as a change.
    eq: Arc<dyn Fn(&T, &T) -> bool + Send + Sync>,
}

impl<T> ObservableCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a cell with the given initial value, using `PartialEq` as the
    /// change predicate.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_eq(value, |a, b| a == b)
    }

    /// Create a cell with a custom equality predicate.
    ///
    /// The predicate is the change-detection step of the whole engine: a
    /// write for which it returns `true` propagates nothing.
    pub fn with_eq(value: T, eq: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            id: ObservableId::new(),
            value: Arc::new(RwLock::new(value)),
            dependents: Arc::new(RwLock::new(IndexSet::new())),
            eq: Arc::new(eq),
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> ObservableId {
        self.id
    }

    /// Current value.
    ///
    /// When a derivation is evaluating, the read subscribes it to this cell:
    /// it is added to the dependents (if not already present) and the read is
    /// recorded for dependency reconciliation.
    pub fn read(&self) -> T {
        if let Some(active) = DependencyTracker::active() {
            self.dependents.write().insert(active);
            DependencyTracker::record_read(self.id, Arc::clone(&self.dependents));
        }

        self.value.read().clone()
    }

    /// Current value, without establishing a dependency.
    pub fn read_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Store a new value and propagate to dependents if it changed.
    ///
    /// The value is stored unconditionally; propagation runs only when the
    /// equality predicate reports a change, and is deferred when a
    /// transaction is open. Errors surface a cycle detected somewhere in the
    /// triggered wave.
    pub fn write(&self, value: T) -> Result<(), ReactiveError> {
        if !self.store(value) {
            return Ok(());
        }
        trace!(cell = ?self.id, "value changed");

        let dependents = self.dependent_snapshot();
        if dependents.is_empty() {
            return Ok(());
        }
        Runtime::notify_changed(dependents)
    }

    /// Update the value from the current one.
    pub fn update<F>(&self, f: F) -> Result<(), ReactiveError>
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let guard = self.value.read();
            f(&guard)
        };
        self.write(next)
    }

    /// Store without starting propagation; returns whether the predicate saw
    /// a change. Computed evaluation drives its own forwarding from this.
    pub(crate) fn store(&self, value: T) -> bool {
        let mut guard = self.value.write();
        let changed = !(self.eq)(&guard, &value);
        *guard = value;
        changed
    }

    pub(crate) fn dependent_snapshot(&self) -> DependentSnapshot {
        self.dependents.read().iter().copied().collect()
    }

    /// Get the number of dependent derivations.
    pub fn dependent_count(&self) -> usize {
        self.dependents.read().len()
    }
}

impl<T> Clone for ObservableCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            dependents: Arc::clone(&self.dependents),
            eq: Arc::clone(&self.eq),
        }
    }
}

impl<T> Debug for ObservableCell<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableCell")
            .field("id", &self.id)
            .field("value", &self.read_untracked())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}
