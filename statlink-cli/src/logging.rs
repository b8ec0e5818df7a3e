//! Tracing subscriber setup

use anyhow::{anyhow, Result};
use statlink_config::domains::logging::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Where the log filter came from, highest precedence first
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSource {
    CommandLine(String),
    Config(String),
    RustLog,
    Default,
}

impl FilterSource {
    /// Pick the filter source.
    ///
    /// `config_explicit` is true when a config file was given or
    /// `STATLINK_LOG_LEVEL` was set; otherwise the config level is only a
    /// default and `RUST_LOG` takes over when present.
    pub fn resolve(
        cli_level: Option<&str>,
        config: &LoggingConfig,
        config_explicit: bool,
        rust_log: Option<&str>,
    ) -> Self {
        if let Some(level) = cli_level {
            return FilterSource::CommandLine(level.to_string());
        }
        if config_explicit {
            return FilterSource::Config(config.level.to_string());
        }
        if rust_log.is_some_and(|v| !v.is_empty()) {
            return FilterSource::RustLog;
        }
        FilterSource::Default
    }

    fn build(&self) -> EnvFilter {
        match self {
            FilterSource::CommandLine(level) => EnvFilter::try_new(level).unwrap_or_else(|_| {
                eprintln!("Invalid log level '{}', falling back to 'warn'", level);
                EnvFilter::new("warn")
            }),
            FilterSource::Config(level) => EnvFilter::new(level),
            FilterSource::RustLog => {
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
            }
            // Keep the console readable unless asked otherwise
            FilterSource::Default => EnvFilter::new("warn"),
        }
    }
}

/// Install the global subscriber, writing to stderr
pub fn init_tracing(source: &FilterSource, config: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(source.build())
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    installed.map_err(|e| anyhow!("Failed to initialize tracing: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use statlink_config::domains::logging::LogLevel;

    fn config_at(level: LogLevel) -> LoggingConfig {
        LoggingConfig {
            level,
            ..Default::default()
        }
    }

    #[test]
    fn test_command_line_wins() {
        let source =
            FilterSource::resolve(Some("debug"), &config_at(LogLevel::Error), true, Some("trace"));
        assert_eq!(source, FilterSource::CommandLine("debug".into()));
    }

    #[test]
    fn test_explicit_config_beats_rust_log() {
        let source = FilterSource::resolve(None, &config_at(LogLevel::Info), true, Some("trace"));
        assert_eq!(source, FilterSource::Config("info".into()));
    }

    #[test]
    fn test_rust_log_then_default() {
        let config = config_at(LogLevel::Warn);
        assert_eq!(
            FilterSource::resolve(None, &config, false, Some("statlink=debug")),
            FilterSource::RustLog
        );
        assert_eq!(
            FilterSource::resolve(None, &config, false, Some("")),
            FilterSource::Default
        );
        assert_eq!(
            FilterSource::resolve(None, &config, false, None),
            FilterSource::Default
        );
    }
}
