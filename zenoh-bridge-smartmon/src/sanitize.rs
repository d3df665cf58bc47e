//! Label name and value sanitization.

/// Turn free-form text into a label name.
///
/// Spaces, `/`, `-` and `.` become `_` and the result is lowercased.
/// Applying it twice gives the same result as applying it once.
pub fn sanitize_label_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '-' | '.' => '_',
            c => c,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Strip characters that would break a quoted label value (`"` and newlines).
pub fn sanitize_label_value(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '"' | '\n')).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_name() {
        assert_eq!(sanitize_label_name("SMART Health-Status.V2"), "smart_health_status_v2");
        assert_eq!(sanitize_label_name("Device Model"), "device_model");
        assert_eq!(sanitize_label_name("Data Units Read"), "data_units_read");
        assert_eq!(sanitize_label_name("Sector Sizes/Logical"), "sector_sizes_logical");
        assert_eq!(sanitize_label_name(""), "");
    }

    #[test]
    fn test_label_name_idempotent() {
        for input in ["SMART Health-Status.V2", "Local Time is", "a/b c-d.e", "already_clean"] {
            let once = sanitize_label_name(input);
            assert_eq!(sanitize_label_name(&once), once);
        }
    }

    #[test]
    fn test_label_value() {
        assert_eq!(sanitize_label_value("\"Samsung SSD\"\n"), "Samsung SSD");
        assert_eq!(sanitize_label_value("[512, 4096]"), "[512, 4096]");
        let once = sanitize_label_value("a\"b\nc");
        assert_eq!(sanitize_label_value(&once), once);
    }
}
