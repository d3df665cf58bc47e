//! One collection pass over every device, and the polling loop around it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use smartsight_bridge_framework::{MeasurementBatch, Publisher, StatusPublisher};
use smartsight_common::{Measurement, current_timestamp_secs};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::capability::{CapabilityDetector, FormatCapability};
use crate::command::{CommandRunner, SmartctlCommands};
use crate::config::SmartmonConfig;
use crate::device::{Device, OutputMode};
use crate::enumerate::DeviceEnumerator;
use crate::error::SmartError;
use crate::exposition;
use crate::guard;
use crate::normalize::Normalizer;
use crate::parser::{AttributeStrategy, OutputPatterns, ParserTable};

/// Outcome of one collection pass.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub measurements: MeasurementBatch,
    /// Set when the pass was aborted before any device was read.
    pub fatal: Option<SmartError>,
    pub devices: usize,
    pub inactive: usize,
    pub device_errors: usize,
}

impl CycleReport {
    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }
}

/// Result of probing a single device.
#[derive(Debug, Default)]
struct DeviceOutcome {
    measurements: Vec<Measurement>,
    active: bool,
    failed: bool,
}

/// Shared, immutable state needed to read one device.
struct DeviceReader<R> {
    runner: Arc<R>,
    commands: Arc<SmartctlCommands>,
    parsers: Arc<ParserTable>,
    normalizer: Arc<Normalizer>,
}

impl<R> Clone for DeviceReader<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            commands: Arc::clone(&self.commands),
            parsers: Arc::clone(&self.parsers),
            normalizer: Arc::clone(&self.normalizer),
        }
    }
}

impl<R: CommandRunner> DeviceReader<R> {
    async fn collect(&self, device: Device, mode: OutputMode) -> DeviceOutcome {
        let mut outcome = DeviceOutcome::default();

        if !guard::is_active(self.runner.as_ref(), &self.commands, &device).await {
            outcome.measurements.push(self.normalizer.active(&device, false));
            return outcome;
        }
        outcome.active = true;
        outcome.measurements.push(self.normalizer.active(&device, true));
        outcome
            .measurements
            .push(self.normalizer.run_marker(&device, current_timestamp_secs()));

        if let Err(e) = self.read(&device, mode, &mut outcome.measurements).await {
            warn!(disk = %device.name, error = %e, "Device collection failed");
            outcome.failed = true;
            outcome.measurements.push(self.normalizer.device_error(&device, &e));
        }
        outcome
    }

    async fn read(
        &self,
        device: &Device,
        mode: OutputMode,
        measurements: &mut Vec<Measurement>,
    ) -> Result<(), SmartError> {
        let out = self.runner.run(&self.commands.info(device, mode)).await;
        let text = out
            .usable_text()
            .map_err(|e| SmartError::CommandFailed(format!("info query: {}", e)))?;
        let info = self.parsers.parse_info(mode, &text)?;
        measurements.extend(self.normalizer.info(device, &info));

        if ParserTable::attribute_strategy(device.transport()) == AttributeStrategy::Unsupported {
            let set = self.parsers.parse_attributes(device, "");
            measurements.extend(self.normalizer.attributes(device, &set));
            return Ok(());
        }

        let out = self.runner.run(&self.commands.attributes(device)).await;
        let text = out
            .usable_text()
            .map_err(|e| SmartError::CommandFailed(format!("attribute query: {}", e)))?;
        let set = self.parsers.parse_attributes(device, &text);
        if set.is_empty() {
            debug!(disk = %device.name, "No attributes reported");
        }
        measurements.extend(self.normalizer.attributes(device, &set));
        Ok(())
    }
}

/// Runs collection passes against one smartctl installation.
pub struct SmartCollector<R> {
    reader: DeviceReader<R>,
    detector: CapabilityDetector,
    enumerator: DeviceEnumerator,
    max_concurrent: usize,
}

impl<R: CommandRunner + 'static> SmartCollector<R> {
    /// Build a collector from validated settings.
    pub fn new(runner: R, config: &SmartmonConfig) -> Result<Self, SmartError> {
        let patterns = OutputPatterns::compile()?;
        let (min_version, min_structured_version) = config.version_thresholds()?;

        Ok(Self {
            reader: DeviceReader {
                runner: Arc::new(runner),
                commands: Arc::new(SmartctlCommands::new()),
                parsers: Arc::new(ParserTable::new(&patterns, config.attribute_preamble_lines)),
                normalizer: Arc::new(Normalizer::new(
                    config.metric_prefix.clone(),
                    config.exclude_info_labels.iter().cloned(),
                )),
            },
            detector: CapabilityDetector::new(min_version, min_structured_version),
            enumerator: DeviceEnumerator::new(&patterns),
            max_concurrent: config.max_concurrent_devices.max(1),
        })
    }

    /// Run one pass: detect, enumerate, then read every device.
    ///
    /// A pass-fatal error yields a report holding exactly one
    /// `collector_error` measurement.
    pub async fn collect_once(&self) -> CycleReport {
        let runner = self.reader.runner.as_ref();
        let commands = self.reader.commands.as_ref();

        let capability = match self.detector.detect(runner, commands).await {
            Ok(capability) => capability,
            Err(e) => return self.abort(e),
        };

        let devices = match self.enumerator.enumerate(runner, commands, &capability).await {
            Ok(devices) => devices,
            Err(e) if !e.is_pass_fatal() => {
                warn!(error = %e, "Device enumeration yielded nothing to read");
                let mut report = CycleReport::default();
                report.measurements.push(self.reader.normalizer.version(&capability));
                return report;
            }
            Err(e) => return self.abort(e),
        };

        let mut report = CycleReport {
            devices: devices.len(),
            ..Default::default()
        };
        report.measurements.push(self.reader.normalizer.version(&capability));

        for outcome in self.read_all(devices, &capability).await {
            if !outcome.active {
                report.inactive += 1;
            }
            if outcome.failed {
                report.device_errors += 1;
            }
            report.measurements.extend(outcome.measurements);
        }

        debug!(
            devices = report.devices,
            inactive = report.inactive,
            errors = report.device_errors,
            measurements = report.measurements.len(),
            "Collection pass complete"
        );
        report
    }

    async fn read_all(&self, devices: Vec<Device>, capability: &FormatCapability) -> Vec<DeviceOutcome> {
        let mode = capability.mode();
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for device in devices {
            let reader = self.reader.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                reader.collect(device, mode).await
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(error = %e, "Device read task failed"),
            }
        }
        outcomes
    }

    fn abort(&self, e: SmartError) -> CycleReport {
        error!(error = %e, "Collection pass aborted");
        let mut report = CycleReport::default();
        report.measurements.push(self.reader.normalizer.pass_error(&e));
        report.fatal = Some(e);
        report
    }

    /// Poll forever, pushing every pass to the sinks.
    pub async fn run(self, sinks: CollectorSinks, interval: Duration) {
        info!(interval_secs = interval.as_secs(), "Starting SMART collector");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut failing = false;

        loop {
            ticker.tick().await;
            let report = self.collect_once().await;

            let stats = sinks.publisher.publish_batch(&report.measurements).await;
            if stats.failed > 0 {
                warn!(
                    failed = stats.failed,
                    total = stats.total(),
                    "Some measurements failed to publish"
                );
            }

            if let Some(status) = &sinks.status {
                let result = match &report.fatal {
                    Some(e) => status.publish_error(e.to_string()).await,
                    None if failing => status.publish_running(sinks.metadata.clone()).await,
                    None => Ok(()),
                };
                if let Err(e) = result {
                    warn!(error = %e, "Failed to publish bridge status");
                }
            }
            failing = report.is_fatal();

            if let Some(path) = &sinks.output_file
                && let Err(e) = exposition::write_textfile(path, report.measurements.as_slice())
            {
                warn!(path = %path.display(), error = %e, "Failed to write textfile");
            }

            info!(
                devices = report.devices,
                inactive = report.inactive,
                published = stats.success,
                "Published SMART metrics"
            );
        }
    }
}

/// Where the polling loop sends each pass.
pub struct CollectorSinks {
    pub publisher: Publisher,
    pub status: Option<StatusPublisher>,
    /// Metadata republished with `running` after a failing pass recovers.
    pub metadata: Option<serde_json::Value>,
    pub output_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandError, CommandOutput};
    use crate::mock::ScriptedRunner;

    const VERSION_7_2: &str = include_str!("../tests/fixtures/version_7_2.txt");
    const SCAN_JSON: &str = include_str!("../tests/fixtures/scan.json");
    const INFO_SAT: &str = include_str!("../tests/fixtures/info_sat.txt");
    const INFO_NVME: &str = include_str!("../tests/fixtures/info_nvme.json");
    const ATTRIBUTES_SAT: &str = include_str!("../tests/fixtures/attributes_sat.txt");
    const ATTRIBUTES_NVME: &str = include_str!("../tests/fixtures/attributes_nvme.txt");

    fn structured_host() -> ScriptedRunner {
        ScriptedRunner::new()
            .respond(&["-V"], CommandOutput::success(VERSION_7_2))
            .respond(&["-j", "--scan"], CommandOutput::success(SCAN_JSON))
            .respond(&["-n", "standby", "-d", "sat", "/dev/sda"], CommandOutput::success(""))
            .respond(&["-n", "standby", "-d", "nvme", "/dev/nvme0"], CommandOutput::success(""))
            .respond(&["-A", "-d", "sat", "/dev/sda"], CommandOutput::success(ATTRIBUTES_SAT))
            .respond(&["-A", "-d", "nvme", "/dev/nvme0"], CommandOutput::success(ATTRIBUTES_NVME))
            .respond(
                &["-j", "-i", "-H", "-d", "nvme", "/dev/nvme0"],
                CommandOutput::success(INFO_NVME),
            )
    }

    fn count(report: &CycleReport, name: &str) -> usize {
        report.measurements.iter().filter(|m| m.name == name).count()
    }

    #[tokio::test]
    async fn test_structured_pass_with_device_error() {
        // /dev/sda info is not scripted, so its info query fails.
        let collector = SmartCollector::new(structured_host(), &SmartmonConfig::default()).unwrap();
        let report = collector.collect_once().await;

        assert!(!report.is_fatal());
        assert_eq!(report.devices, 2);
        assert_eq!(report.device_errors, 1);
        assert_eq!(count(&report, "smartmon_version"), 1);
        assert_eq!(count(&report, "smartmon_device_active"), 2);
        assert_eq!(count(&report, "smartmon_smartctl_run"), 2);
        assert_eq!(count(&report, "smartmon_device_info"), 1);
        assert_eq!(count(&report, "smartmon_attributes"), 1);
        assert_eq!(count(&report, "smartmon_collector_error"), 1);

        let error = report
            .measurements
            .iter()
            .find(|m| m.name == "smartmon_collector_error")
            .unwrap();
        assert_eq!(error.labels["disk"], "/dev/sda");
        assert!(!report.measurements.iter().any(|m| m.name.ends_with("_raw_value")));
    }

    #[tokio::test]
    async fn test_degraded_exit_status_still_parsed() {
        let runner = structured_host().respond(
            &["-j", "-i", "-H", "-d", "sat", "/dev/sda"],
            CommandOutput::failed(
                r#"{"smart_status": {"passed": false}, "model_name": "WDC"}"#,
                CommandError::ExitStatus(8),
            ),
        );
        let collector = SmartCollector::new(runner, &SmartmonConfig::default()).unwrap();
        let report = collector.collect_once().await;

        assert_eq!(report.device_errors, 0);
        let healthy = report
            .measurements
            .iter()
            .find(|m| m.name == "smartmon_device_smart_healthy" && m.labels["disk"] == "/dev/sda")
            .unwrap();
        assert_eq!(healthy.value, 0.0);
        assert_eq!(count(&report, "smartmon_reallocated_sector_ct_raw_value"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_pass_matches_sequential() {
        let runner = structured_host().respond(
            &["-j", "-i", "-H", "-d", "sat", "/dev/sda"],
            CommandOutput::success(r#"{"smart_status": {"passed": true}}"#),
        );
        let config = SmartmonConfig {
            max_concurrent_devices: 4,
            ..Default::default()
        };
        let collector = SmartCollector::new(runner, &config).unwrap();
        let report = collector.collect_once().await;

        assert_eq!(report.device_errors, 0);
        assert_eq!(count(&report, "smartmon_device_info"), 2);
        assert_eq!(report.measurements.duplicates(), 0);
    }

    #[tokio::test]
    async fn test_empty_scan_is_not_fatal() {
        let runner = ScriptedRunner::new()
            .respond(&["-V"], CommandOutput::success(VERSION_7_2))
            .respond(&["-j", "--scan"], CommandOutput::success(r#"{"devices": []}"#));
        let collector = SmartCollector::new(runner, &SmartmonConfig::default()).unwrap();
        let report = collector.collect_once().await;

        assert!(!report.is_fatal());
        assert_eq!(report.devices, 0);
        assert_eq!(report.measurements.len(), 1);
        assert_eq!(report.measurements.as_slice()[0].name, "smartmon_version");
    }

    #[tokio::test]
    async fn test_missing_tool_is_fatal() {
        let runner = ScriptedRunner::new().respond(
            &["-V"],
            CommandOutput::failed(Vec::new(), CommandError::NotFound("smartctl".into())),
        );
        let collector = SmartCollector::new(runner, &SmartmonConfig::default()).unwrap();
        let report = collector.collect_once().await;

        assert!(matches!(report.fatal, Some(SmartError::ToolUnavailable(_))));
        assert_eq!(report.measurements.len(), 1);
        assert_eq!(collector.reader.runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_transport_skips_attribute_query() {
        let runner = ScriptedRunner::new()
            .respond(&["-V"], CommandOutput::success(VERSION_7_2))
            .respond(
                &["-j", "--scan"],
                CommandOutput::success(
                    r#"{"devices": [{"name": "/dev/bus/0", "info_name": "/dev/bus/0 [megaraid_disk_00]", "type": "megaraid,0", "protocol": "SCSI"}]}"#,
                ),
            )
            .respond(&["-n", "standby", "-d", "megaraid,0", "/dev/bus/0"], CommandOutput::success(""))
            .respond(
                &["-j", "-i", "-H", "-d", "megaraid,0", "/dev/bus/0"],
                CommandOutput::success(r#"{"smart_status": {"passed": true}}"#),
            );
        let collector = SmartCollector::new(runner, &SmartmonConfig::default()).unwrap();
        let report = collector.collect_once().await;

        assert_eq!(count(&report, "smartmon_info"), 1);
        assert!(
            !collector
                .reader
                .runner
                .calls()
                .iter()
                .any(|args| args[0] == "-A")
        );
    }
}
