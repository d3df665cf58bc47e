//! Line-oriented text output.

use std::collections::BTreeMap;

use regex::Regex;

use super::{InfoParser, OutputPatterns};
use crate::device::{AttributeRow, DeviceInfo};
use crate::error::SmartError;
use crate::sanitize::{sanitize_label_name, sanitize_label_value};

const SUPPORT_KEY: &str = "SMART support is";
const HEALTH_STATUS_KEY: &str = "SMART Health Status";
const OVERALL_HEALTH_KEY: &str = "SMART overall-health self-assessment test result";

/// Minimum whitespace-separated fields of an attribute table row.
const ATTRIBUTE_ROW_FIELDS: usize = 10;

/// Parses `key: value` info/health text.
#[derive(Debug, Clone)]
pub struct LegacyInfoParser {
    line: Regex,
}

impl LegacyInfoParser {
    pub fn new(patterns: &OutputPatterns) -> Self {
        Self {
            line: patterns.info_line.clone(),
        }
    }
}

impl InfoParser for LegacyInfoParser {
    fn parse_info(&self, output: &str) -> Result<DeviceInfo, SmartError> {
        let mut info = DeviceInfo::default();

        for line in output.lines().map(str::trim_end) {
            let Some(caps) = self.line.captures(line) else {
                continue;
            };
            let key = &caps[1];
            let value = caps[2].trim();

            if key.starts_with(SUPPORT_KEY) {
                if value.starts_with("Available") {
                    info.available = true;
                } else if value.starts_with("Enabled") {
                    info.enabled = true;
                }
            } else if (key.starts_with(HEALTH_STATUS_KEY) && value == "OK")
                || (key.starts_with(OVERALL_HEALTH_KEY) && value == "PASSED")
            {
                info.mark_healthy();
            }

            let name = sanitize_label_name(key.trim());
            if !name.is_empty() {
                info.attributes.insert(name, sanitize_label_value(value));
            }
        }

        Ok(info)
    }
}

/// Parse an ATA/SAT attribute table.
///
/// Skips `preamble_lines` and the `ID#` header. Rows with fewer than ten
/// fields (banners, section titles, blank lines) are ignored. Columns:
/// id, name, flag, value, worst, thresh, type, updated, when_failed, raw.
pub fn parse_attribute_table(output: &str, preamble_lines: usize) -> Vec<AttributeRow> {
    output
        .lines()
        .skip(preamble_lines)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < ATTRIBUTE_ROW_FIELDS || fields[0].starts_with("ID#") {
                return None;
            }
            Some(AttributeRow {
                id: fields[0].to_string(),
                name: fields[1].to_string(),
                current_value: fields[3].to_string(),
                worst_value: fields[4].to_string(),
                threshold: fields[5].to_string(),
                raw_value: fields[9].to_string(),
            })
        })
        .collect()
}

/// Parse `key: value` attribute lines (NVMe health log, SCSI).
///
/// Only lines with exactly one colon are used, so timestamps and other
/// colon-bearing values are skipped.
pub fn parse_key_value_attributes(output: &str, preamble_lines: usize) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();

    for line in output.lines().skip(preamble_lines) {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if value.contains(':') {
            continue;
        }
        let key = sanitize_label_name(key.trim());
        if key.is_empty() {
            continue;
        }
        values.insert(key, sanitize_label_value(value.trim()));
    }

    values
}
