//! Parsing of smartctl info and attribute output.
//!
//! Info output is parsed by the strategy matching the [`OutputMode`].
//! Attribute output is always legacy text and parsed by the strategy matching
//! the device [`Transport`]. Both lookups go through [`ParserTable`].

mod legacy;
mod structured;

pub use legacy::{LegacyInfoParser, parse_attribute_table, parse_key_value_attributes};
pub use structured::{RESERVED_KEYS, StructuredInfoParser};

use regex::Regex;

use crate::device::{AttributeSet, Device, DeviceInfo, OutputMode, Transport};
use crate::error::SmartError;

/// Regular expressions for line-oriented output, compiled once.
#[derive(Debug, Clone)]
pub struct OutputPatterns {
    /// `<path> -d <type> # <display name>, <protocol>`
    pub scan_line: Regex,
    /// `<key>: <value>`
    pub info_line: Regex,
}

impl OutputPatterns {
    pub fn compile() -> Result<Self, SmartError> {
        Ok(Self {
            scan_line: Regex::new(r"^(/.+) -d ([\w,]+) # (.+), (.+)$")?,
            info_line: Regex::new(r"^([^:]+): (.+)$")?,
        })
    }
}

/// Turns info/health output into a [`DeviceInfo`].
pub trait InfoParser: Send + Sync {
    fn parse_info(&self, output: &str) -> Result<DeviceInfo, SmartError>;
}

/// How attribute output of a transport is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeStrategy {
    /// Numbered attribute table with fixed columns.
    Table,
    /// `key: value` lines flattened into one label set.
    KeyValue,
    /// Not read; reported as unsupported.
    Unsupported,
}

const ATTRIBUTE_STRATEGIES: &[(Transport, AttributeStrategy)] = &[
    (Transport::Ata, AttributeStrategy::Table),
    (Transport::Sat, AttributeStrategy::Table),
    (Transport::Nvme, AttributeStrategy::KeyValue),
    (Transport::Scsi, AttributeStrategy::KeyValue),
    (Transport::Unknown, AttributeStrategy::Unsupported),
];

/// Dispatch table over output modes and transports.
pub struct ParserTable {
    legacy: LegacyInfoParser,
    structured: StructuredInfoParser,
    preamble_lines: usize,
}

impl ParserTable {
    pub fn new(patterns: &OutputPatterns, preamble_lines: usize) -> Self {
        Self {
            legacy: LegacyInfoParser::new(patterns),
            structured: StructuredInfoParser,
            preamble_lines,
        }
    }

    pub fn info_parser(&self, mode: OutputMode) -> &dyn InfoParser {
        match mode {
            OutputMode::Legacy => &self.legacy,
            OutputMode::Structured => &self.structured,
        }
    }

    pub fn attribute_strategy(transport: Transport) -> AttributeStrategy {
        ATTRIBUTE_STRATEGIES
            .iter()
            .find(|(t, _)| *t == transport)
            .map(|(_, strategy)| *strategy)
            .unwrap_or(AttributeStrategy::Unsupported)
    }

    pub fn parse_info(&self, mode: OutputMode, output: &str) -> Result<DeviceInfo, SmartError> {
        self.info_parser(mode).parse_info(output)
    }

    /// Parse `-A` output of `device`.
    pub fn parse_attributes(&self, device: &Device, output: &str) -> AttributeSet {
        match Self::attribute_strategy(device.transport()) {
            AttributeStrategy::Table => {
                AttributeSet::Table(parse_attribute_table(output, self.preamble_lines))
            }
            AttributeStrategy::KeyValue => {
                AttributeSet::Flat(parse_key_value_attributes(output, self.preamble_lines))
            }
            AttributeStrategy::Unsupported => AttributeSet::Unsupported {
                device_type: device.device_type.clone(),
            },
        }
    }
}
