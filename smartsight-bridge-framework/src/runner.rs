//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;

use tokio::signal;
use tokio::task::JoinHandle;

use smartsight_common::{KeyExprBuilder, LoggingConfig, connect, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::Publisher;
use crate::status::StatusPublisher;

/// Initialize logging from the configuration, honouring `--log-level`.
pub fn init_logging(config: &LoggingConfig, args: Option<&BridgeArgs>) -> Result<()> {
    let log_config = match args.and_then(|a| a.log_level.as_deref()) {
        Some(level) => config.with_level(level),
        None => config.clone(),
    };

    init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))
}

/// Bridge runner that manages the lifecycle of a bridge.
///
/// Handles:
/// - Logging initialization
/// - Zenoh connection
/// - Task spawning and management
/// - Graceful shutdown on Ctrl+C
/// - Status publishing (optional)
pub struct BridgeRunner<C: BridgeConfig> {
    name: String,
    version: String,
    config: C,
    session: Arc<zenoh::Session>,
    publisher: Publisher,
    status_publisher: Option<StatusPublisher>,
    announced: bool,
    tasks: Vec<JoinHandle<()>>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner.
    ///
    /// This will:
    /// 1. Initialize logging based on config (with optional CLI override)
    /// 2. Connect to Zenoh
    /// 3. Create the publisher
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        init_logging(config.logging(), args)?;
        Self::start(name, config).await
    }

    /// Create a runner when logging has already been initialized.
    pub async fn start(name: impl Into<String>, config: C) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let session = Arc::new(
            connect(config.zenoh())
                .await
                .map_err(|e| BridgeError::ZenohConnection(e.to_string()))?,
        );

        let keys = KeyExprBuilder::new(config.key_prefix(), config.hostname());
        let publisher = Publisher::new(session.clone(), keys, config.format());

        Ok(Self {
            name,
            version,
            config,
            session,
            publisher,
            status_publisher: None,
            announced: false,
            tasks: Vec::new(),
        })
    }

    /// Enable status publishing.
    ///
    /// When enabled, the runner publishes status messages on startup and shutdown.
    pub fn with_status_publishing(mut self) -> Self {
        self.status_publisher = Some(StatusPublisher::new(
            self.publisher.clone(),
            &self.name,
            &self.version,
        ));
        self
    }

    /// Get the bridge name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the bridge version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get the Zenoh session.
    pub fn session(&self) -> &Arc<zenoh::Session> {
        &self.session
    }

    /// Get a clone of the publisher.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Status publisher, if status publishing is enabled.
    pub fn status_publisher(&self) -> Option<StatusPublisher> {
        self.status_publisher.clone()
    }

    /// Publish the "running" status now instead of from [`run`](Self::run).
    ///
    /// Call before spawning tasks that publish status themselves, so their
    /// first report lands after "running".
    pub async fn announce(&mut self, metadata: Option<serde_json::Value>) {
        if let Some(ref status_pub) = self.status_publisher
            && let Err(e) = status_pub.publish_running(metadata).await
        {
            tracing::warn!(error = %e, "Failed to publish running status");
        }
        self.announced = true;
    }

    /// Spawn a worker task.
    ///
    /// The task will be tracked and aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(future));
    }

    /// Run the bridge until Ctrl+C is received.
    pub async fn run(self) -> Result<()> {
        self.run_with_metadata(None).await
    }

    /// Run the bridge with custom status metadata.
    ///
    /// 1. Publish "running" status (if enabled and not yet announced)
    /// 2. Wait for Ctrl+C
    /// 3. Abort all spawned tasks
    /// 4. Publish "offline" status (if enabled)
    /// 5. Close the Zenoh session
    pub async fn run_with_metadata(mut self, metadata: Option<serde_json::Value>) -> Result<()> {
        if !self.announced {
            self.announce(metadata).await;
        }

        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        for task in &self.tasks {
            task.abort();
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        if let Some(ref status_pub) = self.status_publisher
            && let Err(e) = status_pub.publish_offline().await
        {
            tracing::warn!(error = %e, "Failed to publish offline status");
        }

        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}
