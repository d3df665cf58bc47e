//! JSON (`-j`) info output.

use serde_json::{Map, Value};

use super::InfoParser;
use crate::device::DeviceInfo;
use crate::error::SmartError;
use crate::sanitize::{sanitize_label_name, sanitize_label_value};

/// Top-level keys that never become info labels.
pub const RESERVED_KEYS: &[&str] = &["json_format_version", "smartctl", "device", "smart_status"];

/// Parses `smartctl -j -i -H` documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredInfoParser;

impl InfoParser for StructuredInfoParser {
    fn parse_info(&self, output: &str) -> Result<DeviceInfo, SmartError> {
        let doc: Map<String, Value> = serde_json::from_str(output)
            .map_err(|e| SmartError::MalformedOutput(format!("invalid info JSON: {}", e)))?;

        let mut info = DeviceInfo::default();

        if let Some(support) = doc.get("smart_support") {
            info.available = flag(support, "available");
            info.enabled = flag(support, "enabled");
        }
        if doc.get("smart_status").is_some_and(|status| flag(status, "passed")) {
            info.mark_healthy();
        }

        for (key, value) in &doc {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            info.attributes
                .insert(sanitize_label_name(key), sanitize_label_value(&value.to_string()));
        }

        Ok(info)
    }
}

fn flag(object: &Value, key: &str) -> bool {
    object.get(key).and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO_NVME: &str = include_str!("../../tests/fixtures/info_nvme.json");

    #[test]
    fn test_parse_nvme_info() {
        let info = StructuredInfoParser.parse_info(INFO_NVME).unwrap();
        assert!(info.available && info.enabled && info.healthy);
        assert_eq!(info.attributes["model_name"], "Samsung SSD 970 EVO Plus 1TB");
        assert_eq!(info.attributes["serial_number"], "S4EWNX0N000000");
        assert_eq!(info.attributes["logical_block_size"], "512");
        assert_eq!(info.attributes["nvme_pci_vendor"], "{id:5197,subsystem_id:5197}");
    }

    #[test]
    fn test_reserved_keys_skipped() {
        let info = StructuredInfoParser.parse_info(INFO_NVME).unwrap();
        for key in RESERVED_KEYS {
            assert!(!info.attributes.contains_key(*key));
        }
    }

    #[test]
    fn test_failed_status() {
        let info = StructuredInfoParser
            .parse_info(r#"{"smart_status": {"passed": false}, "smart_support": {"available": true, "enabled": true}}"#)
            .unwrap();
        assert!(info.available);
        assert!(info.enabled);
        assert!(!info.healthy);
    }

    #[test]
    fn test_missing_status() {
        let info = StructuredInfoParser.parse_info(r#"{"model_name": "X"}"#).unwrap();
        assert!(!info.healthy);
        assert_eq!(info.attributes["model_name"], "X");
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            StructuredInfoParser.parse_info("{\"truncated\": "),
            Err(SmartError::MalformedOutput(_))
        ));
        assert!(matches!(
            StructuredInfoParser.parse_info("[1, 2]"),
            Err(SmartError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_idempotent() {
        assert_eq!(
            StructuredInfoParser.parse_info(INFO_NVME).unwrap(),
            StructuredInfoParser.parse_info(INFO_NVME).unwrap()
        );
    }
}
