//! Reactions: side-effecting derivations.
//!
//! A reaction runs its closure whenever a propagation wave reaches it. It
//! produces no value; it exists to synchronize reactive state with the
//! outside world.
//!
//! # How Reactions Work
//!
//! 1. When created, the reaction runs its closure immediately to discover
//!    its initial dependency set.
//!
//! 2. A wave that reaches the reaction with at least one actually-changed
//!    path re-runs the closure; reads during the run re-discover the
//!    dependency set, so conditional branches subscribe and unsubscribe the
//!    cells they gate.
//!
//! 3. Dropping the [`Reaction`] handle unregisters it; later waves skip it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::derivation::{Derivation, DerivationCore, DerivationId};
use super::error::ReactiveError;
use super::runtime::{RegistryHandle, Runtime};

pub(crate) struct ReactionInner {
    core: DerivationCore,
    run: Box<dyn Fn() + Send + Sync>,
    runs: AtomicUsize,
}

impl Derivation for ReactionInner {
    fn core(&self) -> &DerivationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<(), ReactiveError> {
        self.core.evaluate_with(|| {
            (self.run)();
            Ok(())
        })?;
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A registered side-effecting reaction.
///
/// # Example
///
/// ```rust,ignore
/// let count = ObservableCell::new(0);
///
/// let printer = {
///     let count = count.clone();
///     Reaction::new(move || println!("count is {}", count.read()))?
/// };
///
/// count.write(5)?; // prints: "count is 5"
/// ```
pub struct Reaction {
    inner: Arc<ReactionInner>,
    _registration: RegistryHandle,
}

impl Reaction {
    /// Register a reaction and evaluate it immediately to discover its
    /// initial dependencies.
    pub fn new(run: impl Fn() + Send + Sync + 'static) -> Result<Self, ReactiveError> {
        let inner = Arc::new(ReactionInner {
            core: DerivationCore::new(),
            run: Box::new(run),
            runs: AtomicUsize::new(0),
        });
        let registration = Runtime::register(inner.clone());
        inner.evaluate()?;

        Ok(Self {
            inner,
            _registration: registration,
        })
    }

    /// Get the reaction's derivation ID.
    pub fn id(&self) -> DerivationId {
        self.inner.core.id()
    }

    /// Completed evaluations, including the initial one.
    pub fn run_count(&self) -> usize {
        self.inner.runs.load(Ordering::SeqCst)
    }

    /// Number of cells the most recent run read.
    pub fn dependency_count(&self) -> usize {
        self.inner.core.dependency_count()
    }
}

impl std::fmt::Debug for Reaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reaction")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}
