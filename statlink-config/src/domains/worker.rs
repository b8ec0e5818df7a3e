//! Worker launch configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};

/// How to find and launch the worker executable
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Installation directory; also used as the worker's working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,

    /// Executable name, resolved inside `install_dir` when set
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Extra arguments passed after `listen <pipe>`
    #[serde(default)]
    pub args: Vec<String>,

    /// Log file handed to the worker unless `args` already names one
    #[serde(default = "default_log_file")]
    pub default_log_file: Option<PathBuf>,

    /// Prefix for generated pipe names
    #[serde(default = "default_pipe_prefix")]
    pub pipe_prefix: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            install_dir: None,
            executable: default_executable(),
            args: Vec::new(),
            default_log_file: default_log_file(),
            pipe_prefix: default_pipe_prefix(),
        }
    }
}

impl WorkerConfig {
    /// Full path of the worker executable
    pub fn executable_path(&self) -> PathBuf {
        match &self.install_dir {
            Some(dir) => dir.join(&self.executable),
            None => PathBuf::from(&self.executable),
        }
    }

    /// Working directory for the worker process
    pub fn working_dir(&self) -> Option<&Path> {
        self.install_dir.as_deref()
    }
}

impl Validatable for WorkerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.executable, "executable", self.domain_name())?;
        validate_required_string(&self.pipe_prefix, "pipe_prefix", self.domain_name())?;

        if !self
            .pipe_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(self.validation_error(format!(
                "pipe_prefix may only contain ASCII letters, digits, '-' and '_', got '{}'",
                self.pipe_prefix
            )));
        }

        if let Some(dir) = &self.install_dir {
            if dir.as_os_str().is_empty() {
                return Err(self.validation_error("install_dir cannot be empty when set"));
            }
        }

        if let Some(log_file) = &self.default_log_file {
            if log_file.as_os_str().is_empty() {
                return Err(self.validation_error("default_log_file cannot be empty when set"));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "worker"
    }
}

fn default_executable() -> String {
    if cfg!(windows) {
        "STAT.EXE".to_string()
    } else {
        "stat".to_string()
    }
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("stat.log"))
}

fn default_pipe_prefix() -> String {
    "statlink".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_defaults() {
        let config = WorkerConfig::default();
        assert!(config.install_dir.is_none());
        assert_eq!(config.default_log_file, Some(PathBuf::from("stat.log")));
        assert_eq!(config.pipe_prefix, "statlink");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_executable_resolves_inside_install_dir() {
        let config = WorkerConfig {
            install_dir: Some(PathBuf::from("/opt/stat")),
            executable: "stat".to_string(),
            ..Default::default()
        };
        assert_eq!(config.executable_path(), PathBuf::from("/opt/stat").join("stat"));
        assert_eq!(config.working_dir(), Some(Path::new("/opt/stat")));
    }

    #[test]
    fn test_worker_config_validation() {
        let mut config = WorkerConfig::default();

        config.executable = String::new();
        assert!(config.validate().is_err());

        config = WorkerConfig::default();
        config.pipe_prefix = "bad/prefix".to_string();
        assert!(config.validate().is_err());

        config = WorkerConfig::default();
        config.install_dir = Some(PathBuf::new());
        assert!(config.validate().is_err());
    }
}
