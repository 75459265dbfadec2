//! Concurrent verification against one entry.
//!
//! Attempt accounting happens inside a single storage update, so racing
//! callers cannot get more than `max_attempts` wrong guesses evaluated before
//! the cooldown applies.

use std::{sync::Barrier, thread};

use chatlock_core::{GateError, Storage};
use chatlock_harness::{PIN, SimEnv, WRONG_PIN, gate_with_owner, user};

const THREADS: usize = 16;

#[test]
fn concurrent_wrong_guesses_never_exceed_limit() {
    let env = SimEnv::new();
    let owner = user("owner").unwrap();
    let peer = user("peer").unwrap();
    let gate = gate_with_owner(env, &owner).unwrap();
    gate.lock(&owner, &peer, PIN).unwrap();

    let barrier = Barrier::new(THREADS);
    let results: Vec<GateError> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    gate.verify_pin(&owner, &peer, WRONG_PIN).unwrap_err()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let invalid = results.iter().filter(|e| **e == GateError::InvalidPin).count();
    let limited =
        results.iter().filter(|e| matches!(e, GateError::RateLimited { .. })).count();

    assert_eq!(invalid, gate.config().max_attempts, "exactly max_attempts guesses evaluated");
    assert_eq!(limited, THREADS - gate.config().max_attempts);

    let record = gate.storage().load_owner(&owner).unwrap().unwrap();
    assert_eq!(record.entry(&peer).unwrap().failed_attempts().len(), gate.config().max_attempts);
}

#[test]
fn concurrent_locks_on_distinct_peers_are_all_kept() {
    let env = SimEnv::new();
    let owner = user("owner").unwrap();
    let gate = gate_with_owner(env, &owner).unwrap();

    thread::scope(|scope| {
        for i in 0..THREADS {
            let gate = &gate;
            let owner = &owner;
            scope.spawn(move || {
                let peer = user(&format!("peer-{i}")).unwrap();
                gate.lock(owner, &peer, PIN).unwrap();
            });
        }
    });

    assert_eq!(gate.list_locked(&owner).unwrap().len(), THREADS);
}
