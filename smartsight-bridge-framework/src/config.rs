//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;
use smartsight_common::load_config;

use crate::error::{BridgeError, Result};
use crate::{Format, LoggingConfig, ZenohConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// automatic loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use smartsight_bridge_framework::{BridgeConfig, ZenohConfig, LoggingConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub zenoh: ZenohConfig,
///     pub logging: LoggingConfig,
///     pub key_prefix: String,
///     pub hostname: String,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn zenoh(&self) -> &ZenohConfig { &self.zenoh }
///     fn logging(&self) -> &LoggingConfig { &self.logging }
///     fn key_prefix(&self) -> &str { &self.key_prefix }
///     fn hostname(&self) -> String { self.hostname.clone() }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the Zenoh configuration.
    fn zenoh(&self) -> &ZenohConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Get the key expression prefix for this bridge.
    fn key_prefix(&self) -> &str;

    /// Host name used as the second key expression segment.
    fn hostname(&self) -> String;

    /// Serialization format for published measurements.
    fn format(&self) -> Format {
        Format::Json
    }

    /// Validate the configuration.
    ///
    /// Called automatically after loading. Override to add custom validation.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load configuration from a JSON5 file and validate it.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let config: Self = load_config(path)?;
        config.validate()?;

        Ok(config)
    }
}
