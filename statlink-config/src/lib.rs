//! Domain-driven configuration management for statlink
//!
//! Configuration is split by functional domain (worker launch, timeouts,
//! logging), loaded from YAML with `STATLINK_*` environment overrides, and
//! validated before use.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

// Re-export domain configurations
pub use domains::{
    logging::LoggingConfig, timeouts::TimeoutConfig, worker::WorkerConfig, StatlinkConfig,
};

// Re-export utilities
pub use domains::utils::{serde_duration, serde_duration_millis};
