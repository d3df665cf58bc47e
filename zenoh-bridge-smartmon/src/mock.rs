//! Scripted [`CommandRunner`] replaying recorded smartctl output.
//!
//! Used by the test suites to drive the engine without a real tool or
//! devices.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::command::{CommandError, CommandOutput, CommandRunner};

/// Replays canned outputs keyed by the full argument list and records every
/// invocation.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: HashMap<Vec<String>, CommandOutput>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the output for one exact argument list.
    pub fn respond(mut self, args: &[&str], output: CommandOutput) -> Self {
        self.responses
            .insert(args.iter().map(|a| a.to_string()).collect(), output);
        self
    }

    /// Every argument list seen so far, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    /// The argument lists that targeted `device`, in call order.
    pub fn calls_for(&self, device: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .iter()
            .filter(|args| args.iter().any(|a| a == device))
            .cloned()
            .collect()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, args: &[String]) -> CommandOutput {
        self.calls.lock().push(args.to_vec());

        self.responses.get(args).cloned().unwrap_or_else(|| {
            CommandOutput::failed(
                format!("no scripted output for {:?}", args),
                CommandError::ExitStatus(1),
            )
        })
    }
}
