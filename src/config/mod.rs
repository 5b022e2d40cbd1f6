//! Configuration module for tokio_workerpool.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_workerpool::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Workers: {}", config.executor.worker_count());
//! ```

mod demo;
mod error;
mod executor;
mod logging;
mod parse;

pub use demo::DemoConfig;
pub use error::ConfigError;
pub use executor::ExecutorConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::{env_duration, env_opt, env_or, env_parse, parse_duration};

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Worker pool configuration.
    pub executor: ExecutorConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Demo batch configuration.
    pub demo: DemoConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            executor: ExecutorConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            demo: DemoConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Pool: {}", self.executor.pool_name);
        info!("  Workers: {}", self.executor.worker_count());
        info!("  Queue capacity: {}", self.executor.worker_count());

        match self.executor.shutdown_timeout {
            Some(timeout) => info!("  Shutdown timeout: {:?}", timeout),
            None => info!("  Shutdown timeout: disabled"),
        }

        info!(
            "  Demo batch: {} actions x {:?}",
            self.demo.actions, self.demo.action_duration
        );
        if self.demo.fail_every > 0 {
            info!("  Demo failures: every {} actions", self.demo.fail_every);
        }
    }
}
