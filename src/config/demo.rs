//! Settings for the demo binary.

use std::time::Duration;

use super::parse::{env_duration, env_parse};
use super::ConfigError;

/// Shape of the demo batch submitted by the binary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemoConfig {
    /// Number of actions in the batch.
    pub actions: usize,
    /// How long each action sleeps.
    pub action_duration: Duration,
    /// Every n-th action fails (0 = none).
    pub fail_every: usize,
    /// Deadline for the whole batch.
    pub timeout: Option<Duration>,
}

impl DemoConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            actions: env_parse("DEMO_ACTIONS", 8)?,
            action_duration: Duration::from_millis(env_parse("DEMO_ACTION_MS", 250)?),
            fail_every: env_parse("DEMO_FAIL_EVERY", 0)?,
            timeout: env_duration("DEMO_TIMEOUT", "off")?,
        })
    }

    /// Whether the action at `index` (0-based) should fail.
    pub fn fails(&self, index: usize) -> bool {
        self.fail_every > 0 && (index + 1) % self.fail_every == 0
    }
}
