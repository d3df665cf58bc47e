//! Configuration for the smartmon bridge.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use smartsight_bridge_framework::{BridgeConfig, BridgeError, Format, LoggingConfig, ZenohConfig};

use crate::error::SmartError;
use crate::version::ToolVersion;

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmartmonBridgeConfig {
    /// Zenoh connection settings.
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// SMART collection settings.
    #[serde(default)]
    pub smartmon: SmartmonConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Payload format of published measurements.
    #[serde(default)]
    pub serialization: Format,
}

/// SMART collection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartmonConfig {
    /// Key expression prefix (default: "smartsight/smartmon").
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Hostname to use in key expressions.
    /// Use "auto" to detect automatically (default).
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Poll interval in seconds (default: 60).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// smartctl executable, looked up in `PATH` if not absolute.
    #[serde(default = "default_smartctl_path")]
    pub smartctl_path: PathBuf,

    /// Upper bound for a single smartctl invocation (default: 30).
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Oldest supported smartctl release (default: "6.6").
    #[serde(default = "default_min_version")]
    pub min_version: String,

    /// Oldest release with JSON output (default: "7.0").
    #[serde(default = "default_min_structured_version")]
    pub min_structured_version: String,

    /// Prefix of every metric name (default: "smartmon").
    #[serde(default = "default_metric_prefix")]
    pub metric_prefix: String,

    /// Devices read at the same time (default: 1).
    #[serde(default = "default_max_concurrent_devices")]
    pub max_concurrent_devices: usize,

    /// Banner lines skipped before attribute output (default: 1).
    #[serde(default = "default_attribute_preamble_lines")]
    pub attribute_preamble_lines: usize,

    /// Info keys never turned into labels. They change on every read.
    #[serde(default = "default_exclude_info_labels")]
    pub exclude_info_labels: Vec<String>,

    /// Textfile to rewrite after every pass.
    #[serde(default)]
    pub output_file: Option<PathBuf>,
}

impl Default for SmartmonConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            hostname: default_hostname(),
            poll_interval_secs: default_poll_interval(),
            smartctl_path: default_smartctl_path(),
            command_timeout_secs: default_command_timeout(),
            min_version: default_min_version(),
            min_structured_version: default_min_structured_version(),
            metric_prefix: default_metric_prefix(),
            max_concurrent_devices: default_max_concurrent_devices(),
            attribute_preamble_lines: default_attribute_preamble_lines(),
            exclude_info_labels: default_exclude_info_labels(),
            output_file: None,
        }
    }
}

fn default_key_prefix() -> String {
    "smartsight/smartmon".to_string()
}

fn default_hostname() -> String {
    "auto".to_string()
}

fn default_poll_interval() -> u64 {
    60
}

fn default_smartctl_path() -> PathBuf {
    PathBuf::from("smartctl")
}

fn default_command_timeout() -> u64 {
    30
}

fn default_min_version() -> String {
    "6.6".to_string()
}

fn default_min_structured_version() -> String {
    "7.0".to_string()
}

fn default_metric_prefix() -> String {
    "smartmon".to_string()
}

fn default_max_concurrent_devices() -> usize {
    1
}

fn default_attribute_preamble_lines() -> usize {
    1
}

fn default_exclude_info_labels() -> Vec<String> {
    vec!["local_time_is".to_string(), "local_time".to_string()]
}

impl SmartmonConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Parsed `(min_version, min_structured_version)`.
    pub fn version_thresholds(&self) -> Result<(ToolVersion, ToolVersion), SmartError> {
        Ok((self.min_version.parse()?, self.min_structured_version.parse()?))
    }

    fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be > 0".to_string());
        }
        if self.command_timeout_secs == 0 {
            return Err("command_timeout_secs must be > 0".to_string());
        }
        if self.max_concurrent_devices == 0 {
            return Err("max_concurrent_devices must be >= 1".to_string());
        }
        if self.key_prefix.trim().is_empty() {
            return Err("key_prefix must not be empty".to_string());
        }
        if !is_metric_prefix(&self.metric_prefix) {
            return Err(format!(
                "metric_prefix '{}' must match [a-zA-Z_][a-zA-Z0-9_]*",
                self.metric_prefix
            ));
        }
        self.version_thresholds().map_err(|e| e.to_string())?;
        Ok(())
    }
}

fn is_metric_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl SmartmonBridgeConfig {
    /// Get the hostname to use, resolving "auto" if needed.
    pub fn get_hostname(&self) -> String {
        if self.smartmon.hostname == "auto" {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string())
        } else {
            self.smartmon.hostname.clone()
        }
    }
}

impl BridgeConfig for SmartmonBridgeConfig {
    fn zenoh(&self) -> &ZenohConfig {
        &self.zenoh
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn key_prefix(&self) -> &str {
        &self.smartmon.key_prefix
    }

    fn hostname(&self) -> String {
        self.get_hostname()
    }

    fn format(&self) -> Format {
        self.serialization
    }

    fn validate(&self) -> smartsight_bridge_framework::Result<()> {
        self.smartmon.validate().map_err(BridgeError::validation)
    }
}
