//! Power-state check that keeps standby devices asleep.

use tracing::debug;

use crate::command::{CommandRunner, SmartctlCommands};
use crate::device::Device;

/// Decides whether a device may be read this pass.
///
/// Any failure of the power-state check (non-zero exit, timeout, missing output) counts
/// as inactive.
pub async fn is_active<R: CommandRunner>(
    runner: &R,
    commands: &SmartctlCommands,
    device: &Device,
) -> bool {
    let out = runner.run(&commands.active(device)).await;
    match out.error {
        None => true,
        Some(err) => {
            debug!(device = %device.name, reason = %err, "Device inactive, skipping");
            false
        }
    }
}
