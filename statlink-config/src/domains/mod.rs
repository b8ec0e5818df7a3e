//! Domain-specific configuration modules

pub mod logging;
pub mod timeouts;
pub mod utils;
pub mod worker;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main statlink configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StatlinkConfig {
    /// Worker launch configuration
    #[serde(default)]
    pub worker: worker::WorkerConfig,

    /// Request, probe and teardown time budgets
    #[serde(default)]
    pub timeouts: timeouts::TimeoutConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl StatlinkConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.worker.validate()?;
        self.timeouts.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = StatlinkConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
