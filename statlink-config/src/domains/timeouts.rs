//! Time budgets for talking to the worker

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};

/// Timeouts applied by the client.
///
/// Whole-second values for the protocol budgets, milliseconds for the short
/// polling and teardown waits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long to wait for the worker to create its endpoint
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_connect")]
    pub connect: Duration,

    /// Delay between connect attempts
    #[serde(
        rename = "connect_retry_interval_ms",
        with = "crate::domains::utils::serde_duration_millis",
        default = "default_connect_retry_interval"
    )]
    pub connect_retry_interval: Duration,

    /// Default budget for one request/reply exchange
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_request")]
    pub request: Duration,

    /// Budget for the liveness probe
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_probe")]
    pub probe: Duration,

    /// How long close waits for the channel to shut down
    #[serde(
        rename = "channel_close_ms",
        with = "crate::domains::utils::serde_duration_millis",
        default = "default_channel_close"
    )]
    pub channel_close: Duration,

    /// How long close waits for the worker to exit before killing it
    #[serde(
        rename = "terminate_grace_ms",
        with = "crate::domains::utils::serde_duration_millis",
        default = "default_terminate_grace"
    )]
    pub terminate_grace: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: default_connect(),
            connect_retry_interval: default_connect_retry_interval(),
            request: default_request(),
            probe: default_probe(),
            channel_close: default_channel_close(),
            terminate_grace: default_terminate_grace(),
        }
    }
}

impl Validatable for TimeoutConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.connect.as_millis(), "connect", self.domain_name())?;
        validate_positive(
            self.connect_retry_interval.as_millis(),
            "connect_retry_interval_ms",
            self.domain_name(),
        )?;
        validate_positive(self.request.as_millis(), "request", self.domain_name())?;
        validate_positive(self.probe.as_millis(), "probe", self.domain_name())?;
        validate_positive(self.channel_close.as_millis(), "channel_close_ms", self.domain_name())?;
        validate_positive(
            self.terminate_grace.as_millis(),
            "terminate_grace_ms",
            self.domain_name(),
        )?;

        if self.connect_retry_interval > self.connect {
            return Err(self.validation_error(
                "connect_retry_interval_ms must not exceed the connect timeout",
            ));
        }

        // The probe runs inside the interactive loop and must stay short
        if self.probe > self.request {
            return Err(self.validation_error(format!(
                "probe timeout ({}s) must not exceed the request timeout ({}s)",
                self.probe.as_secs(),
                self.request.as_secs()
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "timeouts"
    }
}

// Default value functions
fn default_connect() -> Duration {
    Duration::from_secs(10)
}

fn default_connect_retry_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_request() -> Duration {
    Duration::from_secs(30)
}

fn default_probe() -> Duration {
    Duration::from_secs(3)
}

fn default_channel_close() -> Duration {
    Duration::from_secs(1)
}

fn default_terminate_grace() -> Duration {
    Duration::from_secs(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_defaults() {
        let config = TimeoutConfig::default();
        assert_eq!(config.connect, Duration::from_secs(10));
        assert_eq!(config.connect_retry_interval, Duration::from_millis(200));
        assert_eq!(config.request, Duration::from_secs(30));
        assert_eq!(config.probe, Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_probe_longer_than_request_is_rejected() {
        let config = TimeoutConfig {
            probe: Duration::from_secs(60),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("probe timeout"));
    }

    #[test]
    fn test_zero_durations_are_rejected() {
        let config = TimeoutConfig {
            terminate_grace: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TimeoutConfig {
            request: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_millisecond_fields_deserialize() {
        let yaml = "connect: 5\nconnect_retry_interval_ms: 50\nterminate_grace_ms: 2500\n";
        let config: TimeoutConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.connect, Duration::from_secs(5));
        assert_eq!(config.connect_retry_interval, Duration::from_millis(50));
        assert_eq!(config.terminate_grace, Duration::from_millis(2500));
        assert_eq!(config.request, Duration::from_secs(30));
    }
}
