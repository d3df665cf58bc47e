//! Disk health telemetry from smartctl.
//!
//! A collection pass detects the installed smartctl version, enumerates the
//! attached devices, skips the ones in standby, and turns the info/health and
//! attribute output of the rest into [`Measurement`]s with stable names and
//! labels:
//!
//! ```text
//! capability -> enumerate -> for each device: active? -> info -> attributes -> normalize
//! ```
//!
//! Both the legacy text output and the JSON output of newer releases are
//! understood. Every smartctl call goes through [`CommandRunner`], so the
//! engine can be driven by recorded output in tests.
//!
//! [`Measurement`]: smartsight_common::Measurement
//! [`CommandRunner`]: command::CommandRunner

pub mod capability;
pub mod collector;
pub mod command;
pub mod config;
pub mod device;
pub mod enumerate;
pub mod error;
pub mod exposition;
pub mod guard;
pub mod mock;
pub mod normalize;
pub mod parser;
pub mod sanitize;
pub mod version;

pub use capability::{CapabilityDetector, FormatCapability};
pub use collector::{CollectorSinks, CycleReport, SmartCollector};
pub use command::{CommandError, CommandOutput, CommandRunner, SmartctlCommands, SmartctlRunner};
pub use config::{SmartmonBridgeConfig, SmartmonConfig};
pub use device::{AttributeRow, AttributeSet, Device, DeviceInfo, OutputMode, Transport};
pub use enumerate::DeviceEnumerator;
pub use error::{Result, SmartError};
pub use normalize::Normalizer;
pub use sanitize::{sanitize_label_name, sanitize_label_value};
pub use version::{ToolVersion, version_at_least};
