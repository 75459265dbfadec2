//! Gate tuning parameters.

use std::time::Duration;

/// Failed verifications allowed inside the window before cooldown
pub const MAX_ATTEMPTS: usize = 5;

/// Sliding window over which failures are counted
pub const ATTEMPT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Lockout after reaching [`MAX_ATTEMPTS`]
pub const COOLDOWN: Duration = Duration::from_secs(15);

/// Lifetime of a grant issued by a successful verification
pub const GRANT_TTL: Duration = Duration::from_secs(15 * 60);

/// Access gate configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Failures inside `attempt_window` that trigger cooldown
    pub max_attempts: usize,
    /// Sliding window for failure counting
    pub attempt_window: Duration,
    /// How long verification is refused after too many failures
    pub cooldown: Duration,
    /// Grant lifetime
    pub grant_ttl: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            attempt_window: ATTEMPT_WINDOW,
            cooldown: COOLDOWN,
            grant_ttl: GRANT_TTL,
        }
    }
}
