//! Executor configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use super::parse::{env_duration, env_or, env_parse};
use super::ConfigError;
use crate::executor::pool::{resolve_parallelism, DEFAULT_POOL_NAME};

/// Worker pool configuration loaded from environment.
///
/// The worker count is resolved at construction time, so it is never zero.
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Pool name used in logs.
    pub pool_name: String,
    /// Upper bound for `close()` in the binary (`None` = wait forever).
    pub shutdown_timeout: Option<Duration>,
    /// Resolved worker count.
    worker_count: NonZeroUsize,
}

impl ExecutorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let requested: i64 = env_parse("POOL_WORKERS", 0)?;

        Ok(Self {
            pool_name: env_or("POOL_NAME", DEFAULT_POOL_NAME),
            shutdown_timeout: env_duration("SHUTDOWN_TIMEOUT", "30s")?,
            worker_count: resolve_parallelism(requested),
        })
    }

    /// Build a configuration for `parallelism` workers (`<= 0` = CPU count).
    pub fn new(parallelism: i64) -> Self {
        Self {
            pool_name: DEFAULT_POOL_NAME.to_string(),
            shutdown_timeout: None,
            worker_count: resolve_parallelism(parallelism),
        }
    }

    /// Set the pool name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.pool_name = name.into();
        self
    }

    /// Get worker count (pre-computed).
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.worker_count.get()
    }

    #[inline]
    pub(crate) fn parallelism(&self) -> NonZeroUsize {
        self.worker_count
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new(0)
    }
}
