//! Logging infrastructure for Parapet.
//!
//! This crate provides:
//! - Structured JSON or pretty logging on stderr
//! - Stable event names for the command line tool
//!
//! # Usage
//!
//! ```ignore
//! use parapet_telemetry::{TelemetryConfig, LogFormat};
//!
//! let config = TelemetryConfig::new()
//!     .with_log_level("debug")
//!     .with_log_format(LogFormat::Pretty);
//!
//! parapet_telemetry::init(&config)?;
//! ```

pub mod config;
pub mod logging;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::{events, init_logging as init};

use thiserror::Error;

/// Telemetry errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),

    /// A log level or filter directive could not be parsed.
    #[error("invalid log filter '{0}'")]
    InvalidFilter(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_config_builder() {
        let config = TelemetryConfig::new()
            .with_log_level("debug")
            .with_log_format(LogFormat::Json);

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_error_display() {
        let err = TelemetryError::InvalidFilter("parapet=loud".into());
        assert_eq!(err.to_string(), "invalid log filter 'parapet=loud'");
    }
}
