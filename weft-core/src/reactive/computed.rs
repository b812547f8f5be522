//! Computed cells: cached derived values.
//!
//! A computed cell is both a derivation and an observable: it reacts to the
//! cells its getter reads, caches the result in an owned cell, and notifies
//! its own dependents in turn.
//!
//! # How Computed Cells Work
//!
//! 1. Registration runs the getter immediately to seed the cache and
//!    discover the dependency set.
//!
//! 2. Phase 1 of a wave that reaches the computed is forwarded eagerly: the
//!    computed stale-marks every dependent of its cached cell *before* any
//!    recomputation starts, so stale counts cover the whole downstream
//!    subgraph up front.
//!
//! 3. When the computed's own count settles, it re-runs the getter, stores
//!    the result, and sends ready notifications downstream carrying whether
//!    the cached value actually changed. An unchanged result stops the wave
//!    here: downstream derivations see their paths settle without a change
//!    and skip recomputation.
//!
//! The `PartialEq` bound exists for that change detection: a computed can
//! produce the same value even when its inputs moved.

use std::fmt::Debug;
use std::sync::Arc;

use super::derivation::{Derivation, DerivationCore, DerivationId};
use super::error::ReactiveError;
use super::observable::{ObservableCell, ObservableId};
use super::runtime::{RegistryHandle, Runtime};

pub(crate) struct ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    core: DerivationCore,

    /// The cached value. `None` only before the first evaluation.
    cell: ObservableCell<Option<T>>,

    getter: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> Derivation for ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn core(&self) -> &DerivationCore {
        &self.core
    }

    /// Phase 1 override: count the incoming edge, then eagerly forward the
    /// stale mark through the cached cell, transitively covering everything
    /// downstream before any send-ready is issued.
    fn mark_stale(&self) {
        self.core.mark_stale();
        for dependent in self.cell.dependent_snapshot() {
            if let Some(derivation) = Runtime::lookup(dependent) {
                derivation.mark_stale();
            }
        }
    }

    fn evaluate(&self) -> Result<(), ReactiveError> {
        self.core.evaluate_with(|| {
            let next = (self.getter)();
            let changed = self.cell.store(Some(next));

            // Phase 2, forwarded: our upstream paths have settled, so the
            // dependents of the cached cell get their ready notifications
            // now, carrying whether the cached value actually moved.
            for dependent in self.cell.dependent_snapshot() {
                if let Some(derivation) = Runtime::lookup(dependent) {
                    derivation.send_ready(changed)?;
                }
            }
            Ok(())
        })
    }
}

/// Read-only handle to a cached derived value.
///
/// Reading inside an evaluation subscribes the active derivation to the
/// cached cell, exactly as with a plain [`ObservableCell`]. `Clone` shares
/// identity. Dropping the last handle unregisters the derivation.
///
/// # Example
///
/// ```rust,ignore
/// let count = ObservableCell::new(2);
///
/// let doubled = {
///     let count = count.clone();
///     ComputedCell::new(move || count.read() * 2)?
/// };
///
/// assert_eq!(doubled.read(), 4);
/// count.write(5)?;
/// assert_eq!(doubled.read(), 10);
/// ```
pub struct ComputedCell<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
    _registration: Arc<RegistryHandle>,
}

impl<T> ComputedCell<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Register a computed value and evaluate it immediately to seed the
    /// cache and discover its dependencies.
    pub fn new(getter: impl Fn() -> T + Send + Sync + 'static) -> Result<Self, ReactiveError> {
        let inner = Arc::new(ComputedInner {
            core: DerivationCore::new(),
            cell: ObservableCell::new(None),
            getter: Box::new(getter),
        });
        let registration = Arc::new(Runtime::register(inner.clone()));
        inner.evaluate()?;

        Ok(Self {
            inner,
            _registration: registration,
        })
    }

    /// Cached value; registers the active derivation as a dependent.
    pub fn read(&self) -> T {
        self.inner
            .cell
            .read()
            .expect("computed cell is evaluated before it can be read")
    }

    /// Cached value, without establishing a dependency.
    pub fn read_untracked(&self) -> T {
        self.inner
            .cell
            .read_untracked()
            .expect("computed cell is evaluated before it can be read")
    }

    /// ID of the cached cell (what downstream dependents subscribe to).
    pub fn id(&self) -> ObservableId {
        self.inner.cell.id()
    }

    /// ID of the computed's own derivation (what upstream cells notify).
    pub fn derivation_id(&self) -> DerivationId {
        self.inner.core.id()
    }

    /// Get the number of derivations depending on the cached value.
    pub fn dependent_count(&self) -> usize {
        self.inner.cell.dependent_count()
    }

    /// Number of cells the most recent evaluation read.
    pub fn dependency_count(&self) -> usize {
        self.inner.core.dependency_count()
    }
}

impl<T> Clone for ComputedCell<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _registration: Arc::clone(&self._registration),
        }
    }
}

impl<T> Debug for ComputedCell<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputedCell")
            .field("id", &self.id())
            .field("value", &self.read_untracked())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}
