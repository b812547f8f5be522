//! Weft Core
//!
//! This crate provides the core dependency-tracking engine for the Weft
//! fine-grained reactivity library. It implements:
//!
//! - Reactive primitives (observable cells, computed cells, reactions)
//! - Implicit dependency discovery with per-evaluation diffing
//! - Glitch-free two-phase (stale/ready) propagation
//! - Transactional write batching
//!
//! # Architecture
//!
//! Everything lives in the [`reactive`] module:
//!
//! - `observable`: generic value cells with pluggable change detection
//! - `derivation`: the stale/ready counting protocol and dependency diffing
//! - `computed` / `reaction`: the two derivation kinds
//! - `runtime`: the derivation registry and the wave driver
//! - `transaction`: write batching
//! - `tracker`: the thread-local evaluation stack behind implicit tracking
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::reactive::{ComputedCell, ObservableCell, Reaction};
//!
//! let count = ObservableCell::new(0);
//!
//! // A cached derived value.
//! let doubled = {
//!     let count = count.clone();
//!     ComputedCell::new(move || count.read() * 2)?
//! };
//!
//! // A side effect that re-runs when its inputs change.
//! let printer = {
//!     let (count, doubled) = (count.clone(), doubled.clone());
//!     Reaction::new(move || {
//!         println!("count: {}, doubled: {}", count.read(), doubled.read());
//!     })?
//! };
//!
//! count.write(5)?; // re-runs the reaction, prints: "count: 5, doubled: 10"
//! ```

pub mod reactive;
