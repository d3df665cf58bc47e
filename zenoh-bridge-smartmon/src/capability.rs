//! Detection of the installed smartctl version and output mode.

use tracing::{debug, info};

use crate::command::{CommandError, CommandRunner, SmartctlCommands};
use crate::device::OutputMode;
use crate::error::SmartError;
use crate::version::ToolVersion;

/// What the installed tool can do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatCapability {
    /// Whether `-j` output can be requested.
    pub supports_structured: bool,
    /// Version token as printed by the tool.
    pub version: String,
}

impl FormatCapability {
    pub fn mode(&self) -> OutputMode {
        if self.supports_structured {
            OutputMode::Structured
        } else {
            OutputMode::Legacy
        }
    }
}

/// Checks the tool version against the configured thresholds.
#[derive(Debug, Clone)]
pub struct CapabilityDetector {
    min_version: ToolVersion,
    min_structured_version: ToolVersion,
}

impl Default for CapabilityDetector {
    fn default() -> Self {
        Self::new(ToolVersion::new(6, 6, 0), ToolVersion::new(7, 0, 0))
    }
}

impl CapabilityDetector {
    pub fn new(min_version: ToolVersion, min_structured_version: ToolVersion) -> Self {
        Self {
            min_version,
            min_structured_version,
        }
    }

    /// Run `smartctl -V` and classify the result.
    pub async fn detect<R: CommandRunner>(
        &self,
        runner: &R,
        commands: &SmartctlCommands,
    ) -> Result<FormatCapability, SmartError> {
        let out = runner.run(&commands.version()).await;
        match &out.error {
            None => {}
            Some(CommandError::ExitStatus(code)) if !out.output.is_empty() => {
                debug!(code, "Version query exited non-zero, parsing output anyway");
            }
            Some(err) => return Err(SmartError::ToolUnavailable(err.to_string())),
        }

        let capability = self.classify(&out.text())?;
        info!(
            version = %capability.version,
            mode = %capability.mode(),
            "Detected smartctl"
        );
        Ok(capability)
    }

    /// Classify the text printed by `smartctl -V`.
    ///
    /// The version is the second whitespace-separated token of the first line
    /// (`smartctl 7.2 2020-12-30 r5155 ...`).
    pub fn classify(&self, output: &str) -> Result<FormatCapability, SmartError> {
        let token = output
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or_default();

        let found: ToolVersion = token.parse()?;
        if found < self.min_version {
            return Err(SmartError::VersionBelowMinimum {
                found: token.to_string(),
                minimum: self.min_version.to_string(),
            });
        }

        Ok(FormatCapability {
            supports_structured: found >= self.min_structured_version,
            version: token.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::mock::ScriptedRunner;

    const VERSION_7_2: &str = include_str!("../tests/fixtures/version_7_2.txt");
    const VERSION_6_6: &str = include_str!("../tests/fixtures/version_6_6.txt");

    #[test]
    fn test_structured_capable() {
        let cap = CapabilityDetector::default().classify(VERSION_7_2).unwrap();
        assert_eq!(cap.version, "7.2");
        assert!(cap.supports_structured);
        assert_eq!(cap.mode(), OutputMode::Structured);
    }

    #[test]
    fn test_legacy_only() {
        let cap = CapabilityDetector::default().classify(VERSION_6_6).unwrap();
        assert_eq!(cap.version, "6.6");
        assert!(!cap.supports_structured);
        assert_eq!(cap.mode(), OutputMode::Legacy);
    }

    #[test]
    fn test_below_minimum() {
        let err = CapabilityDetector::default()
            .classify("smartctl 6.5 2016-05-07 r4318 [x86_64-linux-4.4.0] (local build)")
            .unwrap_err();
        assert_eq!(
            err,
            SmartError::VersionBelowMinimum {
                found: "6.5".into(),
                minimum: "6.6".into()
            }
        );
    }

    #[test]
    fn test_unparsable() {
        let detector = CapabilityDetector::default();
        assert!(matches!(
            detector.classify("smartctl not-a-number"),
            Err(SmartError::VersionUnparsable(_))
        ));
        assert!(matches!(detector.classify(""), Err(SmartError::VersionUnparsable(_))));
    }

    #[test]
    fn test_custom_thresholds() {
        let detector = CapabilityDetector::new(ToolVersion::new(6, 0, 0), ToolVersion::new(7, 3, 0));
        let cap = detector.classify(VERSION_7_2).unwrap();
        assert!(!cap.supports_structured);
    }

    #[tokio::test]
    async fn test_detect_missing_tool() {
        let runner = ScriptedRunner::new().respond(
            &["-V"],
            CommandOutput::failed(Vec::new(), CommandError::NotFound("smartctl".into())),
        );
        let err = CapabilityDetector::default()
            .detect(&runner, &SmartctlCommands::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SmartError::ToolUnavailable(_)));
    }

    #[tokio::test]
    async fn test_detect_runs_version_query() {
        let runner = ScriptedRunner::new().respond(&["-V"], CommandOutput::success(VERSION_7_2));
        let cap = CapabilityDetector::default()
            .detect(&runner, &SmartctlCommands::new())
            .await
            .unwrap();
        assert!(cap.supports_structured);
        assert_eq!(runner.calls(), vec![vec!["-V".to_string()]]);
    }
}
