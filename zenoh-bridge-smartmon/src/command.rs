//! Running smartctl.
//!
//! Every invocation goes through the [`CommandRunner`] seam so the rest of the
//! engine can be driven by recorded outputs. [`SmartctlCommands`] holds the
//! flag sets for each operation, one instance per process.

use std::borrow::Cow;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::trace;

use crate::device::{Device, OutputMode};

/// Exit status bits that mean smartctl could not produce usable output
/// (command line did not parse, device open failed).
const FATAL_STATUS_BITS: i32 = 0b0000_0011;

/// Why a command did not complete cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("executable not found: {0}")]
    NotFound(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("exit status {0}")]
    ExitStatus(i32),

    #[error("terminated by signal")]
    Terminated,

    #[error("{0}")]
    Io(String),
}

impl CommandError {
    /// Whether the command still produced output worth parsing.
    ///
    /// smartctl sets exit status bits 2 and up to report device state
    /// (failing health, logged errors). Only bits 0 and 1 mean nothing
    /// useful was printed.
    pub fn output_usable(&self) -> bool {
        matches!(self, CommandError::ExitStatus(code) if code & FATAL_STATUS_BITS == 0)
    }
}

/// Combined stdout/stderr of one invocation plus its failure, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub output: Vec<u8>,
    pub error: Option<CommandError>,
}

impl CommandOutput {
    pub fn success(output: impl Into<Vec<u8>>) -> Self {
        Self {
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(output: impl Into<Vec<u8>>, error: CommandError) -> Self {
        Self {
            output: output.into(),
            error: Some(error),
        }
    }

    /// Output decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }

    /// Output text if it can be parsed, the failure otherwise.
    pub fn usable_text(&self) -> Result<Cow<'_, str>, &CommandError> {
        match &self.error {
            Some(err) if !err.output_usable() => Err(err),
            _ => Ok(self.text()),
        }
    }
}

/// Executes smartctl with the given arguments.
pub trait CommandRunner: Send + Sync {
    fn run(&self, args: &[String]) -> impl Future<Output = CommandOutput> + Send;
}

impl<R: CommandRunner> CommandRunner for Arc<R> {
    fn run(&self, args: &[String]) -> impl Future<Output = CommandOutput> + Send {
        (**self).run(args)
    }
}

/// Runs the real smartctl binary as a child process.
#[derive(Debug, Clone)]
pub struct SmartctlRunner {
    program: PathBuf,
    timeout: Duration,
}

impl SmartctlRunner {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl CommandRunner for SmartctlRunner {
    async fn run(&self, args: &[String]) -> CommandOutput {
        trace!(program = %self.program.display(), ?args, "Running command");

        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result,
            Err(_) => {
                return CommandOutput::failed(Vec::new(), CommandError::Timeout(self.timeout));
            }
        };

        match result {
            Ok(out) => {
                let mut combined = out.stdout;
                combined.extend_from_slice(&out.stderr);
                match out.status.code() {
                    Some(0) => CommandOutput::success(combined),
                    Some(code) => CommandOutput::failed(combined, CommandError::ExitStatus(code)),
                    None => CommandOutput::failed(combined, CommandError::Terminated),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CommandOutput::failed(
                Vec::new(),
                CommandError::NotFound(self.program.display().to_string()),
            ),
            Err(e) => CommandOutput::failed(Vec::new(), CommandError::Io(e.to_string())),
        }
    }
}

/// Argument sets for each smartctl operation.
#[derive(Debug, Clone)]
pub struct SmartctlCommands {
    version: Vec<String>,
    scan: Vec<String>,
    active: Vec<String>,
    info: Vec<String>,
    attributes: Vec<String>,
    structured_flag: String,
}

impl Default for SmartctlCommands {
    fn default() -> Self {
        let owned = |args: &[&str]| args.iter().map(|a| a.to_string()).collect();
        Self {
            version: owned(&["-V"]),
            scan: owned(&["--scan"]),
            active: owned(&["-n", "standby"]),
            info: owned(&["-i", "-H"]),
            attributes: owned(&["-A"]),
            structured_flag: "-j".to_string(),
        }
    }
}

impl SmartctlCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> Vec<String> {
        self.version.clone()
    }

    pub fn scan(&self, mode: OutputMode) -> Vec<String> {
        self.with_mode(mode, &self.scan)
    }

    /// Power-state check that never spins up a standby device.
    pub fn active(&self, device: &Device) -> Vec<String> {
        Self::for_device(self.active.clone(), device)
    }

    pub fn info(&self, device: &Device, mode: OutputMode) -> Vec<String> {
        Self::for_device(self.with_mode(mode, &self.info), device)
    }

    /// Attribute dump. Always requested in legacy text form.
    pub fn attributes(&self, device: &Device) -> Vec<String> {
        Self::for_device(self.attributes.clone(), device)
    }

    fn with_mode(&self, mode: OutputMode, args: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(args.len() + 1);
        if mode == OutputMode::Structured {
            out.push(self.structured_flag.clone());
        }
        out.extend_from_slice(args);
        out
    }

    fn for_device(mut args: Vec<String>, device: &Device) -> Vec<String> {
        args.push("-d".to_string());
        args.push(device.device_type.clone());
        args.push(device.name.clone());
        args
    }
}
