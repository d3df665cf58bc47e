//! Device discovery through `smartctl --scan`.

use std::collections::HashSet;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::capability::FormatCapability;
use crate::command::{CommandRunner, SmartctlCommands};
use crate::device::{Device, OutputMode};
use crate::error::SmartError;
use crate::parser::OutputPatterns;

#[derive(Debug, Deserialize)]
struct ScanDocument {
    devices: Option<Vec<Device>>,
}

/// Lists the devices attached to the host.
#[derive(Debug, Clone)]
pub struct DeviceEnumerator {
    scan_line: Regex,
}

impl DeviceEnumerator {
    pub fn new(patterns: &OutputPatterns) -> Self {
        Self {
            scan_line: patterns.scan_line.clone(),
        }
    }

    /// Run the scan in the detected mode and parse its output.
    ///
    /// Fails with [`SmartError::EmptyDeviceList`] when the scan succeeds but
    /// reports nothing.
    pub async fn enumerate<R: CommandRunner>(
        &self,
        runner: &R,
        commands: &SmartctlCommands,
        capability: &FormatCapability,
    ) -> Result<Vec<Device>, SmartError> {
        let mode = capability.mode();
        let out = runner.run(&commands.scan(mode)).await;
        let text = out
            .usable_text()
            .map_err(|err| SmartError::ToolUnavailable(format!("device scan failed: {}", err)))?;

        let devices = match mode {
            OutputMode::Legacy => self.parse_scan_text(&text)?,
            OutputMode::Structured => parse_scan_json(&text)?,
        };
        let devices = dedup_by_name(devices);

        if devices.is_empty() {
            return Err(SmartError::EmptyDeviceList);
        }
        debug!(count = devices.len(), %mode, "Enumerated devices");
        Ok(devices)
    }

    /// Parse legacy scan lines of the form
    /// `<path> -d <type> # <display name>, <protocol> device`.
    ///
    /// A single non-blank line that does not match fails the whole scan.
    pub fn parse_scan_text(&self, output: &str) -> Result<Vec<Device>, SmartError> {
        let mut devices = Vec::new();

        for line in output.lines().map(str::trim_end) {
            if line.trim().is_empty() {
                continue;
            }
            let caps = self.scan_line.captures(line).ok_or_else(|| {
                SmartError::MalformedOutput(format!("unrecognized scan line '{}'", line))
            })?;

            let protocol = caps[4].trim();
            let protocol = protocol.strip_suffix(" device").unwrap_or(protocol);
            devices.push(
                Device::new(&caps[1], &caps[2])
                    .with_display_name(caps[3].trim())
                    .with_protocol(protocol),
            );
        }

        Ok(devices)
    }
}

/// Parse `smartctl -j --scan` output.
pub fn parse_scan_json(output: &str) -> Result<Vec<Device>, SmartError> {
    let doc: ScanDocument = serde_json::from_str(output)
        .map_err(|e| SmartError::MalformedOutput(format!("invalid scan JSON: {}", e)))?;
    doc.devices.ok_or(SmartError::MissingDevicesKey)
}

fn dedup_by_name(devices: Vec<Device>) -> Vec<Device> {
    let mut seen = HashSet::new();
    devices
        .into_iter()
        .filter(|device| {
            let fresh = seen.insert(device.name.clone());
            if !fresh {
                warn!(device = %device.name, "Ignoring duplicate scan entry");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandError, CommandOutput};
    use crate::mock::ScriptedRunner;

    const SCAN_TEXT: &str = include_str!("../tests/fixtures/scan.txt");
    const SCAN_JSON: &str = include_str!("../tests/fixtures/scan.json");

    fn enumerator() -> DeviceEnumerator {
        DeviceEnumerator::new(&OutputPatterns::compile().unwrap())
    }

    fn capability(structured: bool) -> FormatCapability {
        FormatCapability {
            supports_structured: structured,
            version: if structured { "7.2" } else { "6.6" }.to_string(),
        }
    }

    #[test]
    fn test_parse_scan_text() {
        let devices = enumerator().parse_scan_text(SCAN_TEXT).unwrap();
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].name, "/dev/sda");
        assert_eq!(devices[0].device_type, "sat");
        assert_eq!(devices[0].display_name, "/dev/sda [SAT]");
        assert_eq!(devices[0].protocol, "ATA");
        assert_eq!(devices[2].name, "/dev/nvme0");
        assert_eq!(devices[2].device_type, "nvme");
        assert_eq!(devices[2].protocol, "NVMe");
    }

    #[test]
    fn test_parse_scan_text_with_type_options() {
        let devices = enumerator()
            .parse_scan_text("/dev/bus/0 -d megaraid,0 # /dev/bus/0 [megaraid_disk_00], SCSI device\n")
            .unwrap();
        assert_eq!(devices[0].device_type, "megaraid,0");
    }

    #[test]
    fn test_parse_scan_text_all_or_nothing() {
        let output = format!("{}garbage line\n", SCAN_TEXT);
        let err = enumerator().parse_scan_text(&output).unwrap_err();
        assert!(matches!(err, SmartError::MalformedOutput(_)));
    }

    #[test]
    fn test_parse_scan_text_blank_lines() {
        let devices = enumerator()
            .parse_scan_text("\n/dev/sda -d sat # /dev/sda [SAT], ATA device\n\n  \n")
            .unwrap();
        assert_eq!(devices.len(), 1);
    }

    #[test]
    fn test_parse_scan_json() {
        let devices = parse_scan_json(SCAN_JSON).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].display_name, "/dev/sda [SAT]");
        assert_eq!(devices[1].device_type, "nvme");
    }

    #[test]
    fn test_parse_scan_json_missing_key() {
        let err = parse_scan_json(r#"{"json_format_version": [1, 0]}"#).unwrap_err();
        assert_eq!(err, SmartError::MissingDevicesKey);
    }

    #[test]
    fn test_parse_scan_json_invalid() {
        let err = parse_scan_json("{not json").unwrap_err();
        assert!(matches!(err, SmartError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn test_enumerate_empty() {
        let runner = ScriptedRunner::new().respond(&["-j", "--scan"], CommandOutput::success(r#"{"devices": []}"#));
        let err = enumerator()
            .enumerate(&runner, &SmartctlCommands::new(), &capability(true))
            .await
            .unwrap_err();
        assert_eq!(err, SmartError::EmptyDeviceList);
    }

    #[tokio::test]
    async fn test_enumerate_dedups() {
        let output = "/dev/sda -d sat # /dev/sda [SAT], ATA device\n/dev/sda -d sat # /dev/sda [SAT], ATA device\n";
        let runner = ScriptedRunner::new().respond(&["--scan"], CommandOutput::success(output));
        let devices = enumerator()
            .enumerate(&runner, &SmartctlCommands::new(), &capability(false))
            .await
            .unwrap();
        assert_eq!(devices.len(), 1);
    }

    #[tokio::test]
    async fn test_enumerate_scan_failure() {
        let runner = ScriptedRunner::new().respond(
            &["--scan"],
            CommandOutput::failed(Vec::new(), CommandError::Timeout(std::time::Duration::from_secs(30))),
        );
        let err = enumerator()
            .enumerate(&runner, &SmartctlCommands::new(), &capability(false))
            .await
            .unwrap_err();
        assert!(matches!(err, SmartError::ToolUnavailable(_)));
    }
}
