//! Structured logging to stderr.
//!
//! Stdout belongs to command output, so every layer writes to stderr.

use crate::{LogFormat, TelemetryConfig, TelemetryError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the logging subsystem.
///
/// `RUST_LOG` wins over the configured level when it is set.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(&config.log_level)?,
    };

    match config.log_format {
        LogFormat::Json => init_json_logging(filter),
        LogFormat::Pretty => init_pretty_logging(filter),
    }
}

fn build_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(level).map_err(|_| TelemetryError::InvalidFilter(level.to_string()))
}

fn init_json_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let json_layer = fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_file(false)
        .with_line_number(false)
        .flatten_event(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

fn init_pretty_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .without_time()
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(pretty_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

/// Standard log event names.
pub mod events {
    /// A file has been read and parsed.
    pub const DOCUMENT_READ: &str = "document_read";

    /// A file could not be read or tokenized.
    pub const DOCUMENT_UNREADABLE: &str = "document_unreadable";

    /// References of a document have been bound.
    pub const REFERENCES_RESOLVED: &str = "references_resolved";

    /// A document has been written out.
    pub const DOCUMENT_WRITTEN: &str = "document_written";

    /// A check run has finished.
    pub const CHECK_COMPLETED: &str = "check_completed";
}

/// Helper macros for structured logging with standard fields.
///
/// These wrap the tracing macros to keep event names consistent.
#[macro_export]
macro_rules! log_document_read {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::DOCUMENT_READ,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_document_unreadable {
    ($($field:tt)*) => {
        tracing::error!(
            event = $crate::logging::events::DOCUMENT_UNREADABLE,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_references_resolved {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::REFERENCES_RESOLVED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_document_written {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::DOCUMENT_WRITTEN,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_check_completed {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::CHECK_COMPLETED,
            $($field)*
        )
    };
}
