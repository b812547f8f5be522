//! Reactive runtime.
//!
//! The runtime is the central coordinator that connects cells, computed
//! values, and reactions. It owns the registry of live derivations and
//! drives propagation waves when cells change.
//!
//! # How It Works
//!
//! 1. When a reaction or computed value is registered, the runtime stores a
//!    weak reference to it keyed by its derivation id.
//!
//! 2. Cells record dependent derivations by id. When a cell's value changes,
//!    the runtime resolves the ids back to live derivations; dropped
//!    derivations are skipped.
//!
//! 3. One wave then runs in two phases over the resolved dependents: the
//!    complete mark-stale pass first, then the send-ready pass. Computed
//!    cells forward both phases downstream, so the whole affected subgraph
//!    has final stale counts before any recomputation starts. Waves with
//!    several root cells (transactions) share the same ordering guarantee.
//!
//! # Thread Safety
//!
//! The registry is process-wide and lock-protected; propagation itself is
//! single-threaded and fully synchronous. Arcs to the resolved dependents
//! are held for the duration of a wave so a mid-wave drop cannot tear it.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;
use tracing::debug;

use super::derivation::{Derivation, DerivationId};
use super::error::ReactiveError;
use super::observable::DependentSnapshot;
use super::transaction;

// Global registry of live derivations. Weak references, so a dropped
// reaction or computed value does not stay reachable through its id.
static REGISTRY: OnceLock<RwLock<HashMap<DerivationId, Weak<dyn Derivation>>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<DerivationId, Weak<dyn Derivation>>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Handle to a registered derivation.
///
/// Dropping this handle unregisters the derivation from the runtime; ids
/// left behind in dependent sets then resolve to nothing and are skipped.
pub struct RegistryHandle {
    id: DerivationId,
}

impl Drop for RegistryHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.id);
    }
}

/// The process-wide reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Register a derivation with the runtime.
    ///
    /// Returns a handle that unregisters the derivation when dropped.
    pub fn register(derivation: Arc<dyn Derivation>) -> RegistryHandle {
        let id = derivation.id();
        registry().write().insert(id, Arc::downgrade(&derivation));
        RegistryHandle { id }
    }

    fn unregister(id: DerivationId) {
        registry().write().remove(&id);
    }

    /// Resolve a dependent id to a live derivation, if it still exists.
    pub fn lookup(id: DerivationId) -> Option<Arc<dyn Derivation>> {
        registry().read().get(&id).and_then(Weak::upgrade)
    }

    /// Entry point for a changed cell: defer inside an open transaction,
    /// otherwise run one full wave over the snapshot now.
    pub(crate) fn notify_changed(dependents: DependentSnapshot) -> Result<(), ReactiveError> {
        if transaction::defer(&dependents) {
            return Ok(());
        }
        Self::propagate(&dependents)
    }

    /// Run one two-phase propagation wave over the given direct dependents.
    ///
    /// Every mark-stale call — including the ones computed cells forward
    /// transitively — completes before the first send-ready call, so stale
    /// counts across the whole affected subgraph are final when
    /// recomputation begins. The forwarded dependents receive their ready
    /// notifications from their computed ancestors as those finish
    /// evaluating, cascading the wave level by level.
    pub(crate) fn propagate(dependents: &[DerivationId]) -> Result<(), ReactiveError> {
        let live: Vec<Arc<dyn Derivation>> = dependents
            .iter()
            .filter_map(|id| Self::lookup(*id))
            .collect();
        if live.is_empty() {
            return Ok(());
        }
        debug!(roots = live.len(), "propagation wave");

        for derivation in &live {
            derivation.mark_stale();
        }
        for derivation in &live {
            derivation.send_ready(true)?;
        }
        Ok(())
    }
}
