//! Measurement publisher for Zenoh.

use std::sync::Arc;

use smartsight_common::{Format, KeyExprBuilder, Measurement, encode};

use crate::error::{BridgeError, Result};

/// Publisher for sending measurements to Zenoh.
///
/// Every measurement is published on its own key, derived from the bridge
/// prefix, the host name and the measurement's `disk`/`smart_id` labels
/// (see [`KeyExprBuilder::measurement_key`]).
#[derive(Clone, Debug)]
pub struct Publisher {
    session: Arc<zenoh::Session>,
    keys: KeyExprBuilder,
    format: Format,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(session: Arc<zenoh::Session>, keys: KeyExprBuilder, format: Format) -> Self {
        Self {
            session,
            keys,
            format,
        }
    }

    /// Key expression builder used by this publisher.
    pub fn keys(&self) -> &KeyExprBuilder {
        &self.keys
    }

    /// Get the serialization format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Publish one measurement.
    pub async fn publish(&self, measurement: &Measurement) -> Result<()> {
        let key = self.keys.measurement_key(measurement);
        let payload = encode(measurement, self.format)
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;
        self.put(&key, payload).await
    }

    /// Publish a batch of measurements.
    ///
    /// Individual failures are logged and counted; they do not stop the batch.
    pub async fn publish_batch<'a, I>(&self, measurements: I) -> PublishStats
    where
        I: IntoIterator<Item = &'a Measurement>,
    {
        let mut stats = PublishStats::default();

        for measurement in measurements {
            match self.publish(measurement).await {
                Ok(()) => stats.success += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(metric = %measurement.name, error = %e, "Failed to publish measurement");
                }
            }
        }

        stats
    }

    /// Publish a JSON value to a full key.
    pub async fn publish_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.put(key, payload).await
    }

    async fn put(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        self.session
            .put(key, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                key: key.to_string(),
                message: e.to_string(),
            })
    }
}

/// Statistics from a batch publish operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Number of successfully published measurements.
    pub success: usize,
    /// Number of failed publishes.
    pub failed: usize,
}

impl PublishStats {
    /// Total number of attempted publishes.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            100.0
        } else {
            (self.success as f64 / self.total() as f64) * 100.0
        }
    }
}
