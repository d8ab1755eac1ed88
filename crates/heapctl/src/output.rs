use std::fmt;
use std::str::FromStr;

/// Output format for reports.
///
/// * `Table` - Human-readable table format (default)
/// * `Json` - Compact JSON format (single line)
/// * `JsonPretty` - Pretty-printed JSON format with indentation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Table,
    Json,
    JsonPretty,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(Format::Table),
            "json" => Ok(Format::Json),
            "json-pretty" => Ok(Format::JsonPretty),
            other => Err(format!(
                "unknown format '{}', expected table, json or json-pretty",
                other
            )),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Format::Table => "table",
            Format::Json => "json",
            Format::JsonPretty => "json-pretty",
        };
        write!(f, "{}", s)
    }
}

/// Counters in the reports that are byte amounts rather than counts.
pub fn is_byte_field(name: &str) -> bool {
    matches!(
        name,
        "used"
            | "total"
            | "arena"
            | "hblkhd"
            | "usmblks"
            | "fsmblks"
            | "uordblks"
            | "fordblks"
            | "keepcost"
    ) || name.starts_with("stats.")
}

/// Formats a byte count with binary units, e.g. `"1.5 MB"`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log(THRESHOLD).floor() as usize).min(UNITS.len() - 1);
    let unit_value = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", unit_value, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_round_trips_through_str() {
        for format in [Format::Table, Format::Json, Format::JsonPretty] {
            assert_eq!(format.to_string().parse::<Format>(), Ok(format));
        }
        assert!("yaml".parse::<Format>().is_err());
    }

    #[test]
    fn test_byte_fields() {
        assert!(is_byte_field("uordblks"));
        assert!(is_byte_field("stats.retained"));
        assert!(!is_byte_field("ordblks"));
        assert!(!is_byte_field("hblks"));
    }
}
