//! Device and parsed-output types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Output mode used for scan and info commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputMode {
    /// Human-readable text.
    Legacy,
    /// JSON (`-j`).
    Structured,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Legacy => write!(f, "legacy"),
            OutputMode::Structured => write!(f, "structured"),
        }
    }
}

/// Transport family of a device, derived from its type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Ata,
    Sat,
    Nvme,
    Scsi,
    Unknown,
}

impl Transport {
    /// Classify a smartctl `-d` type tag.
    ///
    /// Tags may carry options after a comma (`sat,12`, `megaraid,0`). Only
    /// the leading word decides the family.
    pub fn from_type_tag(tag: &str) -> Self {
        let base = tag
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match base.as_str() {
            "ata" => Transport::Ata,
            "scsi" => Transport::Scsi,
            b if b.starts_with("sat") => Transport::Sat,
            b if b.starts_with("nvme") => Transport::Nvme,
            _ => Transport::Unknown,
        }
    }
}

/// A storage device reported by the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// OS path, e.g. `/dev/sda`. Unique within one scan.
    pub name: String,

    /// Type tag passed back via `-d`, e.g. `sat` or `nvme`.
    #[serde(rename = "type")]
    pub device_type: String,

    /// Human display name from the scan comment.
    #[serde(rename = "info_name", default)]
    pub display_name: String,

    /// Protocol description, e.g. `ATA` or `NVMe`.
    #[serde(default)]
    pub protocol: String,
}

impl Device {
    pub fn new(name: impl Into<String>, device_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            device_type: device_type.into(),
            protocol: String::new(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn transport(&self) -> Transport {
        Transport::from_type_tag(&self.device_type)
    }
}

/// Identity and health summary of one device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub available: bool,
    pub enabled: bool,
    pub healthy: bool,

    /// Sanitized label name to sanitized label value.
    pub attributes: BTreeMap<String, String>,
}

impl DeviceInfo {
    /// A passing health verdict implies SMART is both available and enabled.
    pub fn mark_healthy(&mut self) {
        self.healthy = true;
        self.available = true;
        self.enabled = true;
    }
}

/// One row of the ATA/SAT attribute table. Fields are kept as text until
/// normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRow {
    pub id: String,
    pub name: String,
    pub current_value: String,
    pub worst_value: String,
    pub threshold: String,
    pub raw_value: String,
}

/// Parsed attribute output, shaped by transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeSet {
    /// Numbered attribute table (ATA/SAT).
    Table(Vec<AttributeRow>),
    /// Flat `key: value` health log (NVMe, SCSI).
    Flat(BTreeMap<String, String>),
    /// No parser for this transport.
    Unsupported { device_type: String },
}

impl AttributeSet {
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeSet::Table(rows) => rows.is_empty(),
            AttributeSet::Flat(values) => values.is_empty(),
            AttributeSet::Unsupported { .. } => true,
        }
    }
}
