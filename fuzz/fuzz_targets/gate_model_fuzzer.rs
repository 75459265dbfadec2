//! Fuzz target comparing the gate against its reference model
//!
//! Coverage-guided counterpart to the proptest model tests: libFuzzer finds
//! operation sequences that reach cooldown and grant-expiry boundaries.
//!
//! # Invariants
//!
//! - Every operation result matches the model
//! - Every peer's status matches the model after every step

#![no_main]

use chatlock_core::GateConfig;
use chatlock_harness::{GateOp, MODEL_PEERS, ModelGate, RealWorld};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u64, Vec<GateOp>)| {
    let (seed, ops) = input;
    let config = GateConfig::default();
    let mut model = ModelGate::new(config);
    let mut real = RealWorld::new(seed, MODEL_PEERS, config).unwrap();

    for op in ops.into_iter().take(64) {
        assert_eq!(real.apply(op).unwrap(), model.apply(op), "{op:?}");
        for peer in 0..MODEL_PEERS {
            assert_eq!(real.status(peer).unwrap(), model.status(peer));
        }
    }
});
