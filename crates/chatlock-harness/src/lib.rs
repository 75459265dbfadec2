//! Deterministic simulation harness for Chat-Lock testing.
//!
//! [`SimEnv`] replaces the wall clock and OS entropy with a manual clock and a
//! seeded RNG, so cooldowns and grant expiry are exercised by advancing time
//! instead of sleeping.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of one owner's
//! gate. Operations are applied to both the model and a [`RealWorld`] wrapping
//! the real [`AccessGate`](chatlock_core::AccessGate), and their observable
//! results are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod model;
pub mod sim_env;
pub mod world;

pub use fixtures::{PIN, SimGate, WRONG_PIN, cheap_hasher, gate_with_owner, sim_gate, user};
pub use model::{GateOp, MODEL_PEERS, ModelGate, ModelPeer, ModelStatus, Outcome};
pub use sim_env::SimEnv;
pub use world::RealWorld;
