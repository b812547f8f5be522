//! Reactive Primitives
//!
//! This module implements the core reactive system: observable cells,
//! computed cells, reactions, and the propagation protocol that connects
//! them.
//!
//! # Concepts
//!
//! ## Observable Cells
//!
//! An [`ObservableCell`] is a container for mutable state. When a cell is
//! read while a derivation is evaluating, the cell automatically registers
//! that derivation as a dependent. When the cell's value changes (as decided
//! by its equality predicate), all dependents are notified.
//!
//! ## Computed Cells
//!
//! A [`ComputedCell`] is a derived value that caches its result. It
//! re-evaluates only when one of its dependencies changes, and notifies its
//! own dependents only when the cached value actually moved.
//!
//! ## Reactions
//!
//! A [`Reaction`] is a side-effecting computation that re-runs whenever its
//! dependencies change. Reactions synchronize reactive state with external
//! systems.
//!
//! ## Transactions
//!
//! [`run_transaction`] batches any number of writes into a single
//! propagation wave: every affected derivation evaluates at most once,
//! observing final values.
//!
//! # Implementation Notes
//!
//! Dependency discovery is implicit: a thread-local tracking stack records
//! the derivation currently evaluating, and cell reads consult it. Each
//! evaluation re-discovers its dependency set and unsubscribes from cells it
//! no longer reads.
//!
//! Propagation is glitch-free: a wave first stale-marks the entire affected
//! subgraph (counting notification edges), then sends ready notifications
//! that cascade level by level, so a derivation recomputes only after every
//! one of its inputs has settled. This two-phase approach is what lets a
//! derivation read two computed values deriving from one shared cell without
//! ever observing one updated and the other stale.

mod computed;
mod derivation;
mod error;
mod observable;
mod reaction;
mod runtime;
mod tracker;
mod transaction;

pub use computed::ComputedCell;
pub use derivation::{Derivation, DerivationCore, DerivationId};
pub use error::ReactiveError;
pub use observable::{ObservableCell, ObservableId};
pub use reaction::Reaction;
pub use runtime::{RegistryHandle, Runtime};
pub use tracker::DependencyTracker;
pub use transaction::{in_transaction, run_transaction};
