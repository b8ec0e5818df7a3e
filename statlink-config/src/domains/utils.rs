//! Utility functions and helpers for configuration

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Serde helper module for Duration serialization as seconds
pub mod serde_duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(seconds))
    }
}

/// Serde helper module for Duration serialization as milliseconds
pub mod serde_duration_millis {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).map_err(serde::ser::Error::custom)?;
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Default functions for serde
pub fn default_false() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Interval {
        #[serde(with = "serde_duration_millis")]
        every: Duration,
    }

    #[test]
    fn test_millis_serialization() {
        let yaml = serde_yaml::to_string(&Interval {
            every: Duration::from_millis(250),
        })
        .unwrap();
        assert_eq!(yaml.trim(), "every: 250");
    }

    #[test]
    fn test_millis_overflow_is_an_error() {
        let result = serde_yaml::to_string(&Interval {
            every: Duration::MAX,
        });
        assert!(result.is_err());
    }
}
