//! SmartSight Common Library
//!
//! Shared types and utilities for SmartSight disk-health bridges:
//!
//! - [`measurement`] - Output data model (`Measurement`, `MeasurementBatch`)
//! - [`serialization`] - JSON/CBOR encoding and decoding
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`session`] - Zenoh session management
//! - [`keyexpr`] - Key expression builders
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod keyexpr;
pub mod measurement;
pub mod serialization;
pub mod session;

pub use config::{LogFormat, LoggingConfig, ZenohConfig, load_config, parse_config};
pub use error::{Error, Result};
pub use keyexpr::{KEY_PREFIX, KeyExprBuilder, sanitize_key};
pub use measurement::{
    Labels, Measurement, MeasurementBatch, MetricKind, SeriesKey, current_timestamp_secs,
};
pub use serialization::{Format, decode, decode_auto, encode};
pub use session::connect;

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG`, when set, takes precedence over `config.level`.
///
/// # Example
///
/// ```ignore
/// use smartsight_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .try_init(),
    }
    .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))
}
