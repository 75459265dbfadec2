//! Real gate driven by model operations.

use std::{collections::HashMap, time::Duration};

use chatlock_core::{Access, GateConfig, GateError, UserId};

use crate::{
    fixtures::{PIN, SimGate, WRONG_PIN, sim_gate_with_config, user},
    model::{GateOp, ModelPeer, ModelStatus, Outcome},
    sim_env::SimEnv,
};

/// One owner's real gate, with the last token per peer remembered.
pub struct RealWorld {
    env: SimEnv,
    gate: SimGate,
    owner: UserId,
    peers: Vec<UserId>,
    tokens: HashMap<ModelPeer, String>,
}

impl RealWorld {
    /// Fresh world: one owner with a PIN, `peers` distinct peers.
    pub fn new(seed: u64, peers: u8, config: GateConfig) -> Result<Self, GateError> {
        let env = SimEnv::with_seed(seed);
        let owner = user("owner")?;
        let gate = sim_gate_with_config(env.clone(), config)?;
        gate.register_owner(&owner)?;
        gate.set_pin(&owner, PIN)?;

        let peers: Vec<UserId> =
            (0..peers).map(|i| user(&format!("peer-{i}"))).collect::<Result<_, _>>()?;

        Ok(Self { env, gate, owner, peers, tokens: HashMap::new() })
    }

    /// World with the default configuration.
    pub fn with_defaults(seed: u64, peers: u8) -> Result<Self, GateError> {
        Self::new(seed, peers, GateConfig::default())
    }

    /// The gate under test.
    pub fn gate(&self) -> &SimGate {
        &self.gate
    }

    /// Apply `op` and translate the result into an [`Outcome`].
    ///
    /// Errors other than the expected gate rejections are returned as `Err`.
    pub fn apply(&mut self, op: GateOp) -> Result<Outcome, GateError> {
        let Some(index) = op.peer() else {
            if let GateOp::Advance { millis } = op {
                self.env.advance(Duration::from_millis(u64::from(millis)));
            }
            return Ok(Outcome::Advanced);
        };
        let peer = self.peer(index)?;
        let pin = |correct: bool| if correct { PIN } else { WRONG_PIN };

        let result = match op {
            GateOp::Lock { correct, .. } => self.gate.lock(&self.owner, &peer, pin(correct)),
            GateOp::Unlock { correct, .. } => self.gate.unlock(&self.owner, &peer, pin(correct)),
            GateOp::Verify { correct, .. } => {
                self.gate.verify_pin(&self.owner, &peer, pin(correct)).map(|issued| {
                    self.tokens.insert(index, issued.token);
                })
            },
            GateOp::Check { present_grant, .. } => {
                let token = if present_grant { self.tokens.get(&index) } else { None };
                return match self.gate.check_access(&self.owner, &peer, token.map(String::as_str))? {
                    Access::Allowed => Ok(Outcome::Allowed),
                    Access::Denied(_) => Ok(Outcome::Denied),
                };
            },
            GateOp::Advance { .. } => return Ok(Outcome::Advanced),
        };

        match result {
            Ok(()) => Ok(Outcome::Ok),
            Err(GateError::InvalidPin) => Ok(Outcome::InvalidPin),
            Err(GateError::RateLimited { cooldown_remaining }) => {
                Ok(Outcome::RateLimited { remaining: cooldown_remaining })
            },
            Err(other) => Err(other),
        }
    }

    /// Status of model peer `index`.
    pub fn status(&self, index: ModelPeer) -> Result<ModelStatus, GateError> {
        let status = self.gate.status(&self.owner, &self.peer(index)?)?;
        Ok(ModelStatus { locked: status.locked, cooldown_remaining: status.cooldown_remaining })
    }

    fn peer(&self, index: ModelPeer) -> Result<UserId, GateError> {
        self.peers
            .get(usize::from(index))
            .cloned()
            .ok_or_else(|| GateError::Validation(format!("no peer {index}")))
    }
}
