//! Configuration loading and environment variable handling

use crate::domains::StatlinkConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "STATLINK".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<StatlinkConfig> {
        let path = path.as_ref();
        log::debug!("Loading configuration from {}", path.display());

        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
                path: path.to_path_buf(),
                source,
            })?;
        let mut config: StatlinkConfig = serde_yaml::from_str(&content)?;

        // Apply environment variable overrides
        self.apply_env_overrides(&mut config)?;

        // Validate all domains
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<StatlinkConfig> {
        let mut config = StatlinkConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<StatlinkConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut StatlinkConfig) -> ConfigResult<()> {
        self.apply_worker_overrides(&mut config.worker)?;
        self.apply_timeout_overrides(&mut config.timeouts)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply worker launch overrides
    fn apply_worker_overrides(
        &self,
        config: &mut crate::domains::worker::WorkerConfig,
    ) -> ConfigResult<()> {
        if let Ok(dir) = self.get_env_var("INSTALL_DIR") {
            config.install_dir = Some(PathBuf::from(dir));
        }

        if let Ok(executable) = self.get_env_var("EXECUTABLE") {
            config.executable = executable;
        }

        if let Ok(args) = self.get_env_var("WORKER_ARGS") {
            config.args = args.split_whitespace().map(str::to_string).collect();
        }

        if let Ok(log_file) = self.get_env_var("LOG_FILE") {
            // An empty value disables the default log file argument
            config.default_log_file = if log_file.is_empty() {
                None
            } else {
                Some(PathBuf::from(log_file))
            };
        }

        if let Ok(prefix) = self.get_env_var("PIPE_PREFIX") {
            config.pipe_prefix = prefix;
        }

        Ok(())
    }

    /// Apply timeout overrides (whole seconds)
    fn apply_timeout_overrides(
        &self,
        config: &mut crate::domains::timeouts::TimeoutConfig,
    ) -> ConfigResult<()> {
        if let Some(connect) = self.get_env_seconds("CONNECT_TIMEOUT")? {
            config.connect = connect;
        }

        if let Some(request) = self.get_env_seconds("REQUEST_TIMEOUT")? {
            config.request = request;
        }

        if let Some(probe) = self.get_env_seconds("PROBE_TIMEOUT")? {
            config.probe = probe;
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    fn get_env_seconds(&self, name: &str) -> ConfigResult<Option<Duration>> {
        match self.get_env_var(name) {
            Ok(value) => {
                let seconds: u64 = value
                    .parse()
                    .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e)))?;
                Ok(Some(Duration::from_secs(seconds)))
            }
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
