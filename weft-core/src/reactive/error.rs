//! Error types surfaced by propagation.

use thiserror::Error;

use super::derivation::DerivationId;

/// Failure of an in-flight propagation wave.
///
/// A wave that fails is abandoned: its stale-count bookkeeping is not rolled
/// back and the wave cannot be resumed. The error unwinds to whichever public
/// call started the wave (a write, a transaction, or a registration).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReactiveError {
    /// A derivation was asked to evaluate while its own evaluation was still
    /// on the stack, meaning it depends (directly or transitively) on its own
    /// output.
    #[error("cycle detected: derivation {0:?} depends on its own output")]
    CycleDetected(DerivationId),
}
