//! Shared builders for gate tests.

use chatlock_core::{AccessGate, Argon2PinHasher, GateConfig, GateError, MemoryStorage, UserId};

use crate::sim_env::SimEnv;

/// PIN set on fixture owners
pub const PIN: &str = "4242";

/// A well-formed PIN that is not [`PIN`]
pub const WRONG_PIN: &str = "0000";

/// Grant secret used by fixture gates
pub const GRANT_SECRET: &[u8] = b"harness-grant-secret";

/// Gate type produced by the fixtures.
pub type SimGate = AccessGate<SimEnv, MemoryStorage, Argon2PinHasher>;

/// Id from a literal.
///
/// # Errors
///
/// - `Validation`: `raw` is empty
pub fn user(raw: &str) -> Result<UserId, GateError> {
    UserId::new(raw)
}

/// Argon2id at minimum cost. Same code path as production, microseconds per
/// hash.
///
/// # Errors
///
/// - `Validation`: never for these parameters
pub fn cheap_hasher() -> Result<Argon2PinHasher, GateError> {
    Argon2PinHasher::with_cost(8, 1, 1)
}

/// Gate over fresh in-memory storage with default configuration.
pub fn sim_gate(env: SimEnv) -> Result<SimGate, GateError> {
    sim_gate_with_config(env, GateConfig::default())
}

/// Gate over fresh in-memory storage.
pub fn sim_gate_with_config(env: SimEnv, config: GateConfig) -> Result<SimGate, GateError> {
    Ok(AccessGate::new(env, MemoryStorage::new(), cheap_hasher()?, GRANT_SECRET.to_vec(), config))
}

/// Gate with `owner` registered and [`PIN`] set.
pub fn gate_with_owner(env: SimEnv, owner: &UserId) -> Result<SimGate, GateError> {
    let gate = sim_gate(env)?;
    gate.register_owner(owner)?;
    gate.set_pin(owner, PIN)?;
    Ok(gate)
}
