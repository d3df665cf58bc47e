//! Zenoh bridge for disk health telemetry.
//!
//! Runs smartctl against every attached storage device on a fixed interval
//! and publishes the normalized measurements to Zenoh. With `--once` it runs
//! a single pass and writes text exposition for node-exporter instead.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use smartsight_bridge_framework::{
    BridgeArgs, BridgeConfig, BridgeError, BridgeRunner, init_logging, parse_with_default,
};

use zenoh_bridge_smartmon::collector::{CollectorSinks, SmartCollector};
use zenoh_bridge_smartmon::command::SmartctlRunner;
use zenoh_bridge_smartmon::config::SmartmonBridgeConfig;
use zenoh_bridge_smartmon::exposition;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    #[command(flatten)]
    bridge: BridgeArgs,

    /// Run a single collection pass, print or write it, and exit.
    #[arg(long)]
    once: bool,

    /// Textfile to write the exposition to (overrides the config).
    #[arg(long)]
    output_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = parse_with_default("smartmon.json5");

    if args.once {
        return run_once(&args).await;
    }

    let config =
        SmartmonBridgeConfig::load(&args.bridge.config).map_err(|e| anyhow::anyhow!("{}", e))?;
    let smartmon = config.smartmon.clone();
    let hostname = config.get_hostname();

    let mut runner = BridgeRunner::new_with_args("smartmon", config, Some(&args.bridge))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?
        .with_status_publishing();

    let collector = SmartCollector::new(
        SmartctlRunner::new(&smartmon.smartctl_path, smartmon.command_timeout()),
        &smartmon,
    )?;

    tracing::info!(
        prefix = %smartmon.key_prefix,
        interval_secs = smartmon.poll_interval_secs,
        hostname = %hostname,
        smartctl = %smartmon.smartctl_path.display(),
        "Smartmon bridge running"
    );

    let metadata = serde_json::json!({
        "hostname": hostname,
        "poll_interval_secs": smartmon.poll_interval_secs,
        "smartctl_path": smartmon.smartctl_path,
        "min_version": smartmon.min_version,
        "min_structured_version": smartmon.min_structured_version,
        "max_concurrent_devices": smartmon.max_concurrent_devices,
    });

    let sinks = CollectorSinks {
        publisher: runner.publisher(),
        status: runner.status_publisher(),
        metadata: Some(metadata.clone()),
        output_file: args.output_file.clone().or(smartmon.output_file.clone()),
    };
    let interval = smartmon.poll_interval();
    runner.announce(Some(metadata)).await;
    runner.spawn(async move {
        collector.run(sinks, interval).await;
    });

    runner.run().await.map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}

/// Single pass without Zenoh. A missing config file falls back to defaults.
async fn run_once(args: &Args) -> Result<()> {
    let config = match SmartmonBridgeConfig::load(&args.bridge.config) {
        Ok(config) => config,
        Err(BridgeError::ConfigNotFound { .. }) => SmartmonBridgeConfig::default(),
        Err(e) => return Err(anyhow::anyhow!("{}", e)),
    };
    init_logging(config.logging(), Some(&args.bridge)).map_err(|e| anyhow::anyhow!("{}", e))?;

    let smartmon = &config.smartmon;
    let collector = SmartCollector::new(
        SmartctlRunner::new(&smartmon.smartctl_path, smartmon.command_timeout()),
        smartmon,
    )?;
    let report = collector.collect_once().await;

    match args.output_file.as_ref().or(smartmon.output_file.as_ref()) {
        Some(path) => exposition::write_textfile(path, report.measurements.as_slice())?,
        None => print!("{}", exposition::render(report.measurements.as_slice())),
    }

    if let Some(e) = report.fatal {
        anyhow::bail!("collection pass failed: {}", e);
    }
    Ok(())
}
