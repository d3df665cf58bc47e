use crate::measurement::Measurement;

/// Default key expression prefix for all SmartSight telemetry.
pub const KEY_PREFIX: &str = "smartsight";

/// Path segment used for measurements that do not belong to a single disk.
pub const PASS_SEGMENT: &str = "_pass";

/// Builder for SmartSight key expressions.
///
/// Key expressions follow the pattern:
/// `<prefix>/<hostname>/<disk>/<metric>[/<smart_id>]`
#[derive(Debug, Clone)]
pub struct KeyExprBuilder {
    prefix: String,
    hostname: String,
}

impl KeyExprBuilder {
    /// Create a builder for a bridge prefix and the host it runs on.
    pub fn new(prefix: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            hostname: sanitize_key(&hostname.into()),
        }
    }

    /// Build the key a measurement is published under.
    ///
    /// The `disk` label selects the device segment and `smart_id`, when
    /// present, is appended so attribute series with a shared mnemonic
    /// stay on distinct keys.
    ///
    /// # Example
    /// ```
    /// use smartsight_common::Measurement;
    /// use smartsight_common::keyexpr::KeyExprBuilder;
    ///
    /// let builder = KeyExprBuilder::new("smartsight/smartmon", "nas01");
    /// let m = Measurement::gauge("smartmon_device_active", 1.0).with_label("disk", "/dev/sda");
    /// assert_eq!(
    ///     builder.measurement_key(&m),
    ///     "smartsight/smartmon/nas01/dev_sda/smartmon_device_active"
    /// );
    /// ```
    pub fn measurement_key(&self, measurement: &Measurement) -> String {
        let disk = measurement
            .labels
            .get("disk")
            .map(|d| sanitize_key(d))
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| PASS_SEGMENT.to_string());

        let mut key = format!(
            "{}/{}/{}/{}",
            self.prefix,
            self.hostname,
            disk,
            sanitize_key(&measurement.name)
        );
        if let Some(id) = measurement.labels.get("smart_id") {
            key.push('/');
            key.push_str(&sanitize_key(id));
        }
        key
    }

    /// Wildcard for every measurement of this host.
    pub fn host_wildcard(&self) -> String {
        format!("{}/{}/**", self.prefix, self.hostname)
    }

    /// Wildcard for every measurement of one disk on this host.
    pub fn disk_wildcard(&self, disk: &str) -> String {
        format!("{}/{}/{}/**", self.prefix, self.hostname, sanitize_key(disk))
    }

    /// Key for bridge status messages.
    pub fn status_key(&self) -> String {
        format!("{}/@/status", self.prefix)
    }
}

/// Sanitize a string for use as a single key expression segment.
///
/// Characters with a meaning in key expressions collapse into one
/// underscore; leading and trailing underscores are removed.
pub fn sanitize_key(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '/' | ' ' | '#' | '?' | '*' | '$' => {
                if !result.ends_with('_') && !result.is_empty() {
                    result.push('_');
                }
            }
            _ => result.push(c),
        }
    }
    result.trim_matches('_').to_string()
}
