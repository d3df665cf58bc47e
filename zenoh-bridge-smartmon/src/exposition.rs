//! Text exposition output for node-exporter's textfile collector.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::{self, Write as _};
use std::path::Path;

use smartsight_common::{Labels, Measurement};

/// Render measurements as text exposition, grouped and sorted by name.
///
/// Metric and label names are sanitized here, since attribute mnemonics
/// come straight from the device.
pub fn render(measurements: &[Measurement]) -> String {
    let mut by_name: BTreeMap<String, Vec<&Measurement>> = BTreeMap::new();
    for m in measurements {
        by_name.entry(exposition_metric_name(&m.name)).or_default().push(m);
    }

    let mut output = String::with_capacity(measurements.len() * 96);
    for (name, mut series) in by_name {
        series.sort_by(|a, b| a.labels.cmp(&b.labels));

        let first = series[0];
        if !first.help.is_empty() {
            writeln!(output, "# HELP {} {}", name, escape_help(&first.help)).ok();
        }
        writeln!(output, "# TYPE {} {}", name, first.kind.as_str()).ok();

        for m in series {
            writeln!(output, "{}{} {}", name, format_labels(&m.labels), format_value(m.value)).ok();
        }
    }
    output
}

/// Write the rendered measurements to `path` atomically.
///
/// The text goes to a temporary file in the same directory which is then
/// renamed over `path`, so readers never see a partial file.
pub fn write_textfile(path: &Path, measurements: &[Measurement]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(render(measurements).as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Sanitize a metric name to match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
///
/// Invalid characters become underscores and runs of underscores collapse.
fn exposition_metric_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 1);
    let mut last_was_underscore = false;

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        result.push('_');
        last_was_underscore = true;
    }

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == ':' {
            result.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore {
            result.push('_');
            last_was_underscore = true;
        }
    }

    while result.ends_with('_') {
        result.pop();
    }
    if result.is_empty() {
        result.push_str("unnamed");
    }
    result
}

/// Sanitize a label name to match `[a-zA-Z_][a-zA-Z0-9_]*`.
///
/// Names starting with `__` are reserved, so they get a leading `z`.
fn exposition_label_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut last_was_underscore = false;

    for (i, c) in name.chars().enumerate() {
        let valid = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };

        if valid {
            result.push(c);
            last_was_underscore = c == '_';
        } else if !last_was_underscore {
            result.push('_');
            last_was_underscore = true;
        }
    }

    while result.ends_with('_') {
        result.pop();
    }
    if result.is_empty() {
        return "label".to_string();
    }
    if result.starts_with("__") {
        result.insert(0, 'z');
    }
    result
}

fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

fn format_labels(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", exposition_label_name(k), escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AttributeRow, Device};
    use crate::normalize::Normalizer;

    fn sample() -> Vec<Measurement> {
        vec![
            Measurement::gauge("smartmon_device_active", 1.0)
                .with_label("type", "sat")
                .with_label("disk", "/dev/sdb"),
            Measurement::gauge("smartmon_device_active", 0.0)
                .with_label("type", "sat")
                .with_label("disk", "/dev/sda"),
            Measurement::gauge("smartmon_smartctl_run", 1_792_318_502.0)
                .with_label("disk", "/dev/sdb")
                .with_label("type", "sat"),
        ]
    }

    #[test]
    fn test_render() {
        let text = render(&sample());
        let expected = "\
# HELP smartmon_device_active SMART metric smartmon_device_active
# TYPE smartmon_device_active gauge
smartmon_device_active{disk=\"/dev/sda\",type=\"sat\"} 0
smartmon_device_active{disk=\"/dev/sdb\",type=\"sat\"} 1
# HELP smartmon_smartctl_run SMART metric smartmon_smartctl_run
# TYPE smartmon_smartctl_run gauge
smartmon_smartctl_run{disk=\"/dev/sdb\",type=\"sat\"} 1792318502
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_escapes_labels() {
        let m = Measurement::info("smartmon_collector_error", "bad \"scan\" line\nC:\\dev");
        let text = render(&[m]);
        assert!(text.contains(r#"smartmon_collector_error{info="bad \"scan\" line\nC:\\dev"} 1"#));
    }

    #[test]
    fn test_metric_name() {
        assert_eq!(exposition_metric_name("smartmon_device_active"), "smartmon_device_active");
        assert_eq!(
            exposition_metric_name("smartmon_power-off_retract_count_value"),
            "smartmon_power_off_retract_count_value"
        );
        assert_eq!(exposition_metric_name("smartmon_total_lbas_written__"), "smartmon_total_lbas_written");
        assert_eq!(exposition_metric_name("9_power_on_hours"), "_9_power_on_hours");
        assert_eq!(exposition_metric_name("---"), "unnamed");
    }

    #[test]
    fn test_label_name() {
        assert_eq!(exposition_label_name("smart_id"), "smart_id");
        assert_eq!(exposition_label_name("rotation-rate"), "rotation_rate");
        assert_eq!(exposition_label_name("1st_key"), "_st_key");
        assert_eq!(exposition_label_name("__name"), "z__name");
        assert_eq!(exposition_label_name(""), "label");
    }

    #[test]
    fn test_render_sanitizes_vendor_attribute_names() {
        let row = AttributeRow {
            id: "192".into(),
            name: "Power-Off_Retract_Count".into(),
            current_value: "100".into(),
            worst_value: "100".into(),
            threshold: "000".into(),
            raw_value: "17".into(),
        };
        let measurements = Normalizer::new("smartmon", Vec::<String>::new())
            .attribute_row(&Device::new("/dev/sda", "sat"), &row)
            .unwrap();
        let text = render(&measurements);

        assert!(text.contains(
            "smartmon_power_off_retract_count_raw_value{disk=\"/dev/sda\",smart_id=\"192\",type=\"sat\"} 17"
        ));
        assert!(!text.contains("power-off"));
        for line in text.lines().filter(|l| !l.starts_with('#')) {
            let name = line.split(['{', ' ']).next().unwrap();
            assert!(
                name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':'),
                "invalid metric name in {line:?}"
            );
        }
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(0.5), "0.5");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[]), "");
    }

    #[test]
    fn test_write_textfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smartmon.prom");

        write_textfile(&path, &sample()).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        assert!(first.contains("smartmon_device_active{disk=\"/dev/sda\",type=\"sat\"} 0"));

        write_textfile(&path, &sample()[..1]).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert!(!second.contains("smartmon_smartctl_run"));

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
