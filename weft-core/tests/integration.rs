//! Integration tests for the reactive engine.
//!
//! These tests exercise cells, computed values, reactions, and transactions
//! together, through the public API only.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use weft_core::reactive::{run_transaction, ComputedCell, ObservableCell, Reaction, ReactiveError};

/// A write equal to the current value must trigger zero evaluations.
#[test]
fn no_op_write_triggers_nothing() {
    let cell = ObservableCell::new(String::from("same"));

    let reaction = {
        let cell = cell.clone();
        Reaction::new(move || {
            cell.read();
        })
        .unwrap()
    };
    assert_eq!(reaction.run_count(), 1);

    cell.write(String::from("same")).unwrap();
    assert_eq!(reaction.run_count(), 1);

    cell.write(String::from("changed")).unwrap();
    assert_eq!(reaction.run_count(), 2);
}

/// A derivation reading two computed values that derive from one shared cell
/// must never observe one updated and the other stale.
#[test]
fn diamond_is_glitch_free() {
    let source = ObservableCell::new(1);

    let left = {
        let source = source.clone();
        ComputedCell::new(move || source.read() * 10).unwrap()
    };
    let right = {
        let source = source.clone();
        ComputedCell::new(move || source.read() + 1).unwrap()
    };

    let observations = Arc::new(Mutex::new(Vec::new()));
    let probe = {
        let (left, right, observations) = (left.clone(), right.clone(), observations.clone());
        Reaction::new(move || {
            observations.lock().push((left.read(), right.read()));
        })
        .unwrap()
    };

    for value in 2..=6 {
        source.write(value).unwrap();
    }

    // One run per write, and never a torn pair.
    assert_eq!(probe.run_count(), 6);
    let observations = observations.lock();
    for (left, right) in observations.iter() {
        assert_eq!(left / 10, right - 1, "torn observation: ({left}, {right})");
    }
    assert_eq!(*observations.last().unwrap(), (60, 7));
}

/// A deeper diamond: the probe sits below two computed legs of different
/// heights, so its notifications arrive over paths of different lengths.
#[test]
fn uneven_diamond_settles_once_per_wave() {
    let source = ObservableCell::new(1);

    let short_leg = {
        let source = source.clone();
        ComputedCell::new(move || source.read() * 2).unwrap()
    };
    let tall_base = {
        let source = source.clone();
        ComputedCell::new(move || source.read() * 3).unwrap()
    };
    let tall_leg = {
        let tall_base = tall_base.clone();
        ComputedCell::new(move || tall_base.read() + 1).unwrap()
    };

    let observations = Arc::new(Mutex::new(Vec::new()));
    let probe = {
        let (short_leg, tall_leg, observations) =
            (short_leg.clone(), tall_leg.clone(), observations.clone());
        Reaction::new(move || {
            observations.lock().push((short_leg.read(), tall_leg.read()));
        })
        .unwrap()
    };

    source.write(10).unwrap();

    assert_eq!(probe.run_count(), 2);
    assert_eq!(*observations.lock().last().unwrap(), (20, 31));
}

/// Conditional reads subscribe and unsubscribe the cells they gate.
#[test]
fn dynamic_pruning_stops_stale_notifications() {
    let mode = ObservableCell::new(String::from("plain"));
    let detail = ObservableCell::new(0);

    let reaction = {
        let (mode, detail) = (mode.clone(), detail.clone());
        Reaction::new(move || {
            if mode.read() == "detailed" {
                detail.read();
            }
        })
        .unwrap()
    };

    detail.write(1).unwrap();
    assert_eq!(reaction.run_count(), 1);

    mode.write(String::from("detailed")).unwrap();
    assert_eq!(reaction.run_count(), 2);

    detail.write(2).unwrap();
    assert_eq!(reaction.run_count(), 3);

    mode.write(String::from("plain")).unwrap();
    assert_eq!(reaction.run_count(), 4);

    // No longer a dependency: further detail changes are invisible.
    detail.write(3).unwrap();
    detail.write(4).unwrap();
    assert_eq!(reaction.run_count(), 4);
    assert_eq!(detail.dependent_count(), 0);
}

/// Any number of writes inside one transaction cause each affected
/// derivation to evaluate at most once, on final values.
#[test]
fn transaction_coalesces_writes_across_cells() {
    let first = ObservableCell::new(1);
    let second = ObservableCell::new(2);

    let sum = {
        let (first, second) = (first.clone(), second.clone());
        ComputedCell::new(move || first.read() + second.read()).unwrap()
    };

    let seen = Arc::new(AtomicI32::new(0));
    let reaction = {
        let (sum, seen) = (sum.clone(), seen.clone());
        Reaction::new(move || {
            seen.store(sum.read(), Ordering::SeqCst);
        })
        .unwrap()
    };
    assert_eq!(seen.load(Ordering::SeqCst), 3);

    run_transaction(|| {
        first.write(10).unwrap();
        second.write(20).unwrap();
        first.write(11).unwrap();
    })
    .unwrap();

    // One recomputation of the sum, one re-run of the reaction.
    assert_eq!(reaction.run_count(), 2);
    assert_eq!(seen.load(Ordering::SeqCst), 31);
}

/// The full conditional-dependency scenario, end to end.
#[test]
fn conditional_dependencies_end_to_end() {
    let test1 = ObservableCell::new(String::from("Message"));
    let test2 = ObservableCell::new(3);

    let test3 = {
        let (test1, test2) = (test1.clone(), test2.clone());
        ComputedCell::new(move || format!("{} {}", test1.read(), test2.read())).unwrap()
    };

    let observed = Arc::new(Mutex::new(Vec::new()));
    let reaction = {
        let (test1, test3, observed) = (test1.clone(), test3.clone(), observed.clone());
        Reaction::new(move || {
            let greeting = test1.read();
            if greeting == "Hello" {
                observed.lock().push(test3.read());
            }
        })
        .unwrap()
    };

    // The initial run took the quiet branch: only test1 is a dependency.
    assert_eq!(reaction.run_count(), 1);
    assert_eq!(reaction.dependency_count(), 1);

    // test2 is not (yet) a dependency, directly or transitively.
    test2.write(5).unwrap();
    assert_eq!(reaction.run_count(), 1);

    // Taking the branch subscribes to the computed, and to test2 through it.
    test1.write(String::from("Hello")).unwrap();
    assert_eq!(reaction.run_count(), 2);
    assert_eq!(reaction.dependency_count(), 2);
    assert_eq!(observed.lock().last().unwrap(), "Hello 5");

    test2.write(42).unwrap();
    assert_eq!(reaction.run_count(), 3);
    assert_eq!(observed.lock().last().unwrap(), "Hello 42");

    // Two writes in one transaction: one re-run, observing the final value.
    run_transaction(|| {
        test2.write(90).unwrap();
        test2.write(100).unwrap();
    })
    .unwrap();
    assert_eq!(reaction.run_count(), 4);
    assert_eq!(observed.lock().last().unwrap(), "Hello 100");

    // Leaving the branch prunes the computed (and test2 with it).
    test1.write(String::from("World")).unwrap();
    assert_eq!(reaction.run_count(), 5);
    assert_eq!(reaction.dependency_count(), 1);

    test2.write(0).unwrap();
    assert_eq!(reaction.run_count(), 5);
}

/// A reaction writing one of its own dependencies is rejected as a cycle
/// instead of recursing.
#[test]
fn self_dependency_is_a_cycle() {
    let counter = ObservableCell::new(0);
    let inner_result = Arc::new(Mutex::new(None));

    let reaction = {
        let (counter, inner_result) = (counter.clone(), inner_result.clone());
        Reaction::new(move || {
            let value = counter.read();
            if value == 0 {
                *inner_result.lock() = Some(counter.write(value + 1));
            }
        })
        .unwrap()
    };

    let result = inner_result.lock().take().expect("inner write happened");
    assert_eq!(result, Err(ReactiveError::CycleDetected(reaction.id())));
}

/// Writes during a transaction are stored immediately; only propagation is
/// deferred to the end of the scope.
#[test]
fn transaction_defers_propagation_not_storage() {
    let cell = ObservableCell::new(0);

    let reaction = {
        let cell = cell.clone();
        Reaction::new(move || {
            cell.read();
        })
        .unwrap()
    };

    run_transaction(|| {
        cell.write(5).unwrap();
        assert_eq!(cell.read_untracked(), 5);
        assert_eq!(reaction.run_count(), 1);
    })
    .unwrap();

    assert_eq!(reaction.run_count(), 2);
}

/// Chained computed values propagate level by level through one wave.
#[test]
fn computed_chain_cascades_in_one_wave() {
    let base = ObservableCell::new(1);

    let doubled = {
        let base = base.clone();
        ComputedCell::new(move || base.read() * 2).unwrap()
    };
    let described = {
        let doubled = doubled.clone();
        ComputedCell::new(move || format!("value: {}", doubled.read())).unwrap()
    };

    let observed = Arc::new(Mutex::new(Vec::new()));
    let tail = {
        let (described, observed) = (described.clone(), observed.clone());
        Reaction::new(move || {
            observed.lock().push(described.read());
        })
        .unwrap()
    };

    base.write(4).unwrap();

    assert_eq!(tail.run_count(), 2);
    assert_eq!(observed.lock().last().unwrap(), "value: 8");
    assert_eq!(described.read_untracked(), "value: 8");
}
