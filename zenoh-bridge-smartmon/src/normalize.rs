//! Conversion of parsed device data into measurements.

use std::collections::HashSet;

use smartsight_common::{Labels, Measurement};
use tracing::warn;

use crate::capability::FormatCapability;
use crate::device::{AttributeRow, AttributeSet, Device, DeviceInfo};
use crate::error::SmartError;

/// Identity label holding the device name.
pub const DISK_LABEL: &str = "disk";
/// Identity label holding the device type tag.
pub const TYPE_LABEL: &str = "type";
/// Label holding the numeric attribute id.
pub const SMART_ID_LABEL: &str = "smart_id";

/// Builds measurement names and label sets under one metric prefix.
#[derive(Debug, Clone)]
pub struct Normalizer {
    prefix: String,
    excluded_info_labels: HashSet<String>,
}

impl Normalizer {
    pub fn new<I, S>(prefix: impl Into<String>, excluded_info_labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            excluded_info_labels: excluded_info_labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn metric_name(&self, suffix: &str) -> String {
        format!("{}_{}", self.prefix, suffix)
    }

    /// `{disk, type}` labels of a device.
    pub fn identity_labels(device: &Device) -> Labels {
        Labels::from([
            (DISK_LABEL.to_string(), device.name.clone()),
            (TYPE_LABEL.to_string(), device.device_type.clone()),
        ])
    }

    fn device_gauge(&self, suffix: &str, device: &Device, value: f64) -> Measurement {
        Measurement::gauge(self.metric_name(suffix), value).with_labels(Self::identity_labels(device))
    }

    fn device_flag(&self, suffix: &str, device: &Device, value: bool) -> Measurement {
        Measurement::flag(self.metric_name(suffix), value).with_labels(Self::identity_labels(device))
    }

    /// `{prefix}_version{version}`.
    pub fn version(&self, capability: &FormatCapability) -> Measurement {
        Measurement::gauge(self.metric_name("version"), 1.0)
            .with_label("version", capability.version.as_str())
            .with_help("smartctl version")
    }

    /// `{prefix}_device_active`, 1 if the device was read this pass.
    pub fn active(&self, device: &Device, active: bool) -> Measurement {
        self.device_flag("device_active", device, active)
    }

    /// `{prefix}_smartctl_run`, unix time the device was last read.
    pub fn run_marker(&self, device: &Device, timestamp: i64) -> Measurement {
        self.device_gauge("smartctl_run", device, timestamp as f64)
    }

    /// `device_info` plus the three SMART support/health flags.
    pub fn info(&self, device: &Device, info: &DeviceInfo) -> Vec<Measurement> {
        let mut labels: Labels = info
            .attributes
            .iter()
            .filter(|(key, _)| !self.excluded_info_labels.contains(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        labels.extend(Self::identity_labels(device));

        vec![
            Measurement::gauge(self.metric_name("device_info"), 1.0).with_labels(labels),
            self.device_flag("device_smart_available", device, info.available),
            self.device_flag("device_smart_enabled", device, info.enabled),
            self.device_flag("device_smart_healthy", device, info.healthy),
        ]
    }

    /// Attribute measurements for one device.
    ///
    /// Table rows with a bad id or numeric field are logged and dropped on
    /// their own.
    pub fn attributes(&self, device: &Device, set: &AttributeSet) -> Vec<Measurement> {
        match set {
            AttributeSet::Table(rows) => rows
                .iter()
                .filter_map(|row| match self.attribute_row(device, row) {
                    Ok(measurements) => Some(measurements),
                    Err(e) => {
                        warn!(disk = %device.name, error = %e, "Skipping attribute row");
                        None
                    }
                })
                .flatten()
                .collect(),
            AttributeSet::Flat(values) => vec![
                Measurement::gauge(self.metric_name("attributes"), 1.0)
                    .with_labels(values.clone())
                    .with_labels(Self::identity_labels(device)),
            ],
            AttributeSet::Unsupported { device_type } => vec![
                Measurement::info(
                    self.metric_name("info"),
                    format!("unsupported device type: {}", device_type),
                )
                .with_labels(Self::identity_labels(device)),
            ],
        }
    }

    /// The four measurements of one attribute table row.
    pub fn attribute_row(&self, device: &Device, row: &AttributeRow) -> Result<[Measurement; 4], SmartError> {
        let id: u32 = row
            .id
            .parse()
            .map_err(|_| SmartError::AttributeRowUnparsable(row.id.clone()))?;
        if row.name.is_empty() {
            return Err(SmartError::AttributeRowUnparsable(row.id.clone()));
        }

        let mnemonic = row.name.to_lowercase();
        let field = |field: &'static str, value: &str| -> Result<f64, SmartError> {
            value.parse::<f64>().map_err(|_| SmartError::NumericFieldInvalid {
                attribute: row.name.clone(),
                field,
                value: value.to_string(),
            })
        };
        let values = [
            ("value", field("value", &row.current_value)?),
            ("worst", field("worst", &row.worst_value)?),
            ("threshold", field("threshold", &row.threshold)?),
            ("raw_value", field("raw_value", &row.raw_value)?),
        ];

        let labels = Self::identity_labels(device);
        let id = id.to_string();
        Ok(values.map(|(suffix, value)| {
            Measurement::gauge(self.metric_name(&format!("{}_{}", mnemonic, suffix)), value)
                .with_labels(labels.clone())
                .with_label(SMART_ID_LABEL, id.as_str())
        }))
    }

    /// Per-device failure carried as `{prefix}_collector_error{disk,type,info}`.
    pub fn device_error(&self, device: &Device, error: &SmartError) -> Measurement {
        Measurement::info(self.metric_name("collector_error"), error.to_string())
            .with_labels(Self::identity_labels(device))
    }

    /// Pass-level failure carried as `{prefix}_collector_error{info}`.
    pub fn pass_error(&self, error: &SmartError) -> Measurement {
        Measurement::info(self.metric_name("collector_error"), error.to_string())
    }
}
