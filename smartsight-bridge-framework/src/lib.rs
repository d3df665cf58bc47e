//! SmartSight Bridge Framework
//!
//! Common abstractions for building bridges that publish disk-health
//! measurements to Zenoh.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`Publisher`] for publishing measurement batches with automatic serialization
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`BridgeStatus`] for standardized status reporting
//!
//! # Example
//!
//! ```ignore
//! use smartsight_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
//!     let publisher = runner.publisher();
//!     runner.spawn(my_worker(publisher));
//!
//!     runner.run().await?;
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod error;
mod publisher;
mod runner;
mod status;

pub use args::{BridgeArgs, parse_with_default};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use publisher::{PublishStats, Publisher};
pub use runner::{BridgeRunner, init_logging};
pub use status::{BridgeStatus, StatusPublisher};

// Re-export commonly used types from smartsight-common
pub use smartsight_common::{
    Format, LoggingConfig, Measurement, MeasurementBatch, ZenohConfig,
};
