//! Reference model of one owner's gate.
//!
//! Deliberately naive: failures are an unbounded list pruned linearly, the
//! cooldown is re-evaluated from scratch, and grants are remembered as plain
//! (expiry, epoch) pairs. The real gate's ring-buffer window and signed tokens
//! must be indistinguishable from this through the public API.

use std::{collections::HashMap, time::Duration};

use arbitrary::Arbitrary;
use chatlock_core::GateConfig;

/// Peer identifier in generated operations (kept small so ops collide).
pub type ModelPeer = u8;

/// Number of distinct peers operations are folded onto
pub const MODEL_PEERS: u8 = 3;

/// Operations applied to both the model and the real gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum GateOp {
    /// Lock a conversation.
    Lock {
        /// Target peer
        peer: ModelPeer,
        /// Whether the right PIN is supplied
        correct: bool,
    },
    /// Unlock a conversation.
    Unlock {
        /// Target peer
        peer: ModelPeer,
        /// Whether the right PIN is supplied
        correct: bool,
    },
    /// Verify the PIN, keeping any grant for later reads.
    Verify {
        /// Target peer
        peer: ModelPeer,
        /// Whether the right PIN is supplied
        correct: bool,
    },
    /// Read check with the last grant issued for the peer (if any).
    Check {
        /// Target peer
        peer: ModelPeer,
        /// Whether to present the last grant
        present_grant: bool,
    },
    /// Advance time.
    Advance {
        /// Milliseconds to advance
        millis: u32,
    },
}

impl GateOp {
    /// Peer folded into `0..MODEL_PEERS`, or `None` for time steps.
    pub fn peer(&self) -> Option<ModelPeer> {
        match *self {
            Self::Lock { peer, .. }
            | Self::Unlock { peer, .. }
            | Self::Verify { peer, .. }
            | Self::Check { peer, .. } => Some(peer % MODEL_PEERS),
            Self::Advance { .. } => None,
        }
    }
}

/// Observable result of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Mutation succeeded (lock, unlock, verify)
    Ok,
    /// PIN rejected
    InvalidPin,
    /// Verification refused during cooldown
    RateLimited {
        /// Remaining cooldown
        remaining: Duration,
    },
    /// Read allowed
    Allowed,
    /// Read denied
    Denied,
    /// Time advanced
    Advanced,
}

/// Observable per-peer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelStatus {
    /// Locked flag
    pub locked: bool,
    /// Remaining cooldown
    pub cooldown_remaining: Duration,
}

#[derive(Debug, Clone, Default)]
struct ModelEntry {
    locked: bool,
    failures: Vec<u64>,
    cooldown_until: Option<u64>,
    epoch: u32,
    last_grant: Option<(u64, u32)>,
}

/// Reference gate for a single owner with a PIN set.
#[derive(Debug, Clone)]
pub struct ModelGate {
    config: GateConfig,
    now_ms: u64,
    entries: HashMap<ModelPeer, ModelEntry>,
}

impl ModelGate {
    /// Model starting at time zero.
    pub fn new(config: GateConfig) -> Self {
        Self { config, now_ms: 0, entries: HashMap::new() }
    }

    /// Apply `op` and return what the caller observes.
    pub fn apply(&mut self, op: GateOp) -> Outcome {
        let now = self.now_ms;
        let config = self.config;

        let Some(peer) = op.peer() else {
            if let GateOp::Advance { millis } = op {
                self.now_ms += u64::from(millis);
            }
            return Outcome::Advanced;
        };
        let entry = self.entries.entry(peer).or_default();

        match op {
            GateOp::Lock { correct, .. } => {
                if !correct {
                    return Outcome::InvalidPin;
                }
                entry.locked = true;
                entry.epoch += 1;
                Outcome::Ok
            },
            GateOp::Unlock { correct, .. } => {
                if !correct {
                    return Outcome::InvalidPin;
                }
                entry.locked = false;
                entry.failures.clear();
                entry.cooldown_until = None;
                entry.epoch += 1;
                Outcome::Ok
            },
            GateOp::Verify { correct, .. } => {
                if let Some(until) = entry.cooldown_until.filter(|&until| until > now) {
                    return Outcome::RateLimited { remaining: Duration::from_millis(until - now) };
                }
                entry.cooldown_until = None;

                let window = millis(config.attempt_window);
                entry.failures.retain(|&at| now - at < window);

                if !correct {
                    entry.failures.push(now);
                    if entry.failures.len() >= config.max_attempts {
                        entry.cooldown_until = Some(now + millis(config.cooldown));
                    }
                    return Outcome::InvalidPin;
                }

                entry.failures.clear();
                entry.last_grant = Some((now + millis(config.grant_ttl), entry.epoch));
                Outcome::Ok
            },
            GateOp::Check { present_grant, .. } => {
                if !entry.locked {
                    return Outcome::Allowed;
                }
                let valid = present_grant
                    && entry
                        .last_grant
                        .is_some_and(|(expires, epoch)| now < expires && epoch == entry.epoch);
                if valid { Outcome::Allowed } else { Outcome::Denied }
            },
            GateOp::Advance { .. } => Outcome::Advanced,
        }
    }

    /// Status of `peer` at the current model time.
    pub fn status(&self, peer: ModelPeer) -> ModelStatus {
        let Some(entry) = self.entries.get(&(peer % MODEL_PEERS)) else {
            return ModelStatus { locked: false, cooldown_remaining: Duration::ZERO };
        };
        let remaining = entry.cooldown_until.map_or(0, |until| until.saturating_sub(self.now_ms));
        ModelStatus { locked: entry.locked, cooldown_remaining: Duration::from_millis(remaining) }
    }

    /// Failures the model currently counts for `peer` (unbounded).
    pub fn failure_count(&self, peer: ModelPeer) -> usize {
        self.entries.get(&(peer % MODEL_PEERS)).map_or(0, |e| e.failures.len())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
