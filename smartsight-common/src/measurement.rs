use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

/// Label set of a measurement.
///
/// A `BTreeMap` keeps keys unique and gives every label set one canonical
/// ordering, so two measurements with the same labels always compare and
/// hash the same regardless of insertion order.
pub type Labels = BTreeMap<String, String>;

/// A single named, labeled numeric data point emitted by a collection cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Metric name (e.g., "smartmon_device_smart_healthy").
    pub name: String,

    /// Context labels (e.g., disk, type, smart_id).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,

    /// The measured value.
    pub value: f64,

    /// Human readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,

    /// Metric kind used by exposition formats.
    #[serde(default)]
    pub kind: MetricKind,
}

impl Measurement {
    /// Create a gauge measurement with a default help string.
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        let name = name.into();
        Self {
            help: format!("SMART metric {}", name),
            name,
            labels: Labels::new(),
            value,
            kind: MetricKind::Gauge,
        }
    }

    /// Create a gauge from a boolean (`1.0` or `0.0`).
    pub fn flag(name: impl Into<String>, value: bool) -> Self {
        Self::gauge(name, if value { 1.0 } else { 0.0 })
    }

    /// Create an informational measurement carrying `message` in the `info` label.
    pub fn info(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: Labels::from([("info".to_string(), message.into())]),
            value: 1.0,
            help: "Status information related to metric collection".to_string(),
            kind: MetricKind::Info,
        }
    }

    /// Add a label. An existing label with the same key is replaced.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add multiple labels. Existing keys are replaced.
    pub fn with_labels<I, K, V>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Override the help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Identity of this measurement within a batch.
    pub fn series_key(&self) -> SeriesKey {
        SeriesKey {
            name: self.name.clone(),
            labels: self
                .labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// The `(name, labels)` pair that must be unique within one batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub name: String,
    pub labels: Vec<(String, String)>,
}

/// Kind of metric, as understood by exposition formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Value that can go up or down (default).
    #[default]
    Gauge,
    /// Monotonically increasing value.
    Counter,
    /// Constant `1` carrying its payload in labels.
    Info,
}

impl MetricKind {
    /// Exposition `# TYPE` string. Info metrics are exposed as gauges.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge | MetricKind::Info => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

/// Ordered collection of measurements that rejects duplicate series.
#[derive(Debug, Default, Clone)]
pub struct MeasurementBatch {
    items: Vec<Measurement>,
    seen: HashSet<SeriesKey>,
    duplicates: usize,
}

impl MeasurementBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a measurement. Returns `false` and drops it if a measurement with
    /// the same name and labels is already present.
    pub fn push(&mut self, measurement: Measurement) -> bool {
        if !self.seen.insert(measurement.series_key()) {
            self.duplicates += 1;
            tracing::warn!(
                metric = %measurement.name,
                labels = ?measurement.labels,
                "Dropping duplicate measurement"
            );
            return false;
        }
        self.items.push(measurement);
        true
    }

    /// Add every measurement from an iterator.
    pub fn extend<I: IntoIterator<Item = Measurement>>(&mut self, measurements: I) {
        for m in measurements {
            self.push(m);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of measurements rejected as duplicates.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Measurement> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Measurement] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Measurement> {
        self.items
    }
}

impl IntoIterator for MeasurementBatch {
    type Item = Measurement;
    type IntoIter = std::vec::IntoIter<Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a MeasurementBatch {
    type Item = &'a Measurement;
    type IntoIter = std::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Get the current time in seconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch.
pub fn current_timestamp_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge_creation() {
        let m = Measurement::gauge("smartmon_device_active", 1.0)
            .with_label("disk", "/dev/sda")
            .with_label("type", "sat");

        assert_eq!(m.name, "smartmon_device_active");
        assert_eq!(m.value, 1.0);
        assert_eq!(m.kind, MetricKind::Gauge);
        assert_eq!(m.labels.get("disk"), Some(&"/dev/sda".to_string()));
        assert_eq!(m.help, "SMART metric smartmon_device_active");
    }

    #[test]
    fn test_info_measurement() {
        let m = Measurement::info("smartmon_collector_error", "smartctl not found");
        assert_eq!(m.value, 1.0);
        assert_eq!(m.kind, MetricKind::Info);
        assert_eq!(m.labels.get("info").unwrap(), "smartctl not found");
    }

    #[test]
    fn test_flag() {
        assert_eq!(Measurement::flag("x", true).value, 1.0);
        assert_eq!(Measurement::flag("x", false).value, 0.0);
    }

    #[test]
    fn test_series_key_ignores_insertion_order() {
        let a = Measurement::gauge("m", 1.0)
            .with_label("disk", "/dev/sda")
            .with_label("type", "sat");
        let b = Measurement::gauge("m", 2.0)
            .with_label("type", "sat")
            .with_label("disk", "/dev/sda");
        assert_eq!(a.series_key(), b.series_key());
    }

    #[test]
    fn test_batch_rejects_duplicates() {
        let mut batch = MeasurementBatch::new();
        assert!(batch.push(Measurement::gauge("m", 1.0).with_label("disk", "a")));
        assert!(batch.push(Measurement::gauge("m", 1.0).with_label("disk", "b")));
        assert!(!batch.push(Measurement::gauge("m", 5.0).with_label("disk", "a")));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.duplicates(), 1);
        assert_eq!(batch.as_slice()[0].value, 1.0);
    }

    #[test]
    fn test_kind_exposition_type() {
        assert_eq!(MetricKind::Gauge.as_str(), "gauge");
        assert_eq!(MetricKind::Info.as_str(), "gauge");
        assert_eq!(MetricKind::Counter.as_str(), "counter");
    }
}
