//! Sensor-reading line parser.
//!
//! The logger firmware prints one reading per line:
//!
//! ```text
//! 2024-01-01T10:00, Temp: 5.0°C, Humidity: 60%
//! ```
//!
//! Parsing is a pure function from one line to a record; the batch entry
//! point skips malformed lines and reports them through diagnostics, so a
//! garbled minority never costs the well-formed rest of a dump. The
//! firmware emits occasional line noise, and skipping it is part of the
//! contract.

use crate::diagnostics::DiagnosticsLog;
use serde::{Deserialize, Serialize};

/// Substring that marks a line as carrying a temperature field.
pub const TEMPERATURE_KEYWORD: &str = "Temp";

/// Substring that marks a line as carrying a humidity field.
pub const HUMIDITY_KEYWORD: &str = "Humidity";

/// One sensor reading recovered from a log line. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecord {
    /// Timestamp field exactly as printed by the firmware
    pub timestamp: String,
    /// Temperature in degrees Celsius
    pub temperature_c: f64,
    /// Relative humidity in percent
    pub humidity_pct: f64,
}

/// Why a line that looked like a reading could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer than three comma-delimited fields
    FieldCount(usize),
    /// A field had no colon-separated value part
    MissingValue(&'static str),
    /// The value part did not parse as a number
    InvalidNumber {
        field: &'static str,
        text: String,
    },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::FieldCount(n) => write!(f, "expected 3 comma-delimited fields, got {n}"),
            ParseError::MissingValue(field) => write!(f, "{field} field has no value after ':'"),
            ParseError::InvalidNumber { field, text } => {
                write!(f, "{field} value {text:?} is not a number")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Whether a line carries both sensor keywords and should be parsed at all.
///
/// Lines failing this filter (boot banners, markers, prompts) are not
/// errors; they are simply not readings.
pub fn is_sensor_line(line: &str) -> bool {
    line.contains(TEMPERATURE_KEYWORD) && line.contains(HUMIDITY_KEYWORD)
}

/// Parse one sensor-reading line into a record.
pub fn parse_line(line: &str) -> Result<ParsedRecord, ParseError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 3 {
        return Err(ParseError::FieldCount(fields.len()));
    }

    let timestamp = fields[0].trim().to_string();

    let raw_temp = field_value(fields[1]).ok_or(ParseError::MissingValue("temperature"))?;
    let temperature_c = parse_number(&raw_temp.replace("°C", "").replace('C', ""), "temperature")?;

    let raw_hum = field_value(fields[2]).ok_or(ParseError::MissingValue("humidity"))?;
    let humidity_pct = parse_number(&raw_hum.replace('%', ""), "humidity")?;

    Ok(ParsedRecord {
        timestamp,
        temperature_c,
        humidity_pct,
    })
}

/// Parse a snapshot of session lines into records, in input order.
///
/// Lines without both keywords are silently skipped. Lines that match the
/// filter but fail to parse are dropped with a diagnostic message; the
/// batch always continues.
pub fn parse_lines(lines: &[String], diagnostics: &DiagnosticsLog) -> Vec<ParsedRecord> {
    let mut records = Vec::new();

    for line in lines {
        if !is_sensor_line(line) {
            continue;
        }
        match parse_line(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                diagnostics.record_line_skipped();
                diagnostics.message(format!("Skipping line due to parse error: {line} ({e})"));
                tracing::debug!("skipped malformed line: {line} ({e})");
            }
        }
    }

    diagnostics.record_records_parsed(records.len() as u64);
    records
}

/// Value part of a `name: value` field.
fn field_value(field: &str) -> Option<&str> {
    field.split(':').nth(1)
}

fn parse_number(text: &str, field: &'static str) -> Result<f64, ParseError> {
    let trimmed = text.trim();
    trimmed.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        text: trimmed.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_line() {
        let record = parse_line("2024-01-01T10:00, Temp: 5.0°C, Humidity: 60%").unwrap();
        assert_eq!(record.timestamp, "2024-01-01T10:00");
        assert_eq!(record.temperature_c, 5.0);
        assert_eq!(record.humidity_pct, 60.0);
    }

    #[test]
    fn test_plain_c_suffix_and_no_suffix() {
        let record = parse_line("ts, Temp: 3.5C, Humidity: 40").unwrap();
        assert_eq!(record.temperature_c, 3.5);
        assert_eq!(record.humidity_pct, 40.0);
    }

    #[test]
    fn test_negative_temperature() {
        let record = parse_line("ts, Temp: -2.5°C, Humidity: 80%").unwrap();
        assert_eq!(record.temperature_c, -2.5);
    }

    #[test]
    fn test_too_few_fields() {
        assert_eq!(
            parse_line("ts, Temp: 5 Humidity: 50"),
            Err(ParseError::FieldCount(2))
        );
    }

    #[test]
    fn test_missing_colon() {
        assert_eq!(
            parse_line("ts, Temp 5, Humidity: 50%"),
            Err(ParseError::MissingValue("temperature"))
        );
    }

    #[test]
    fn test_non_numeric_value() {
        let err = parse_line("ts, Temp: abc, Humidity: 50%").unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidNumber {
                field: "temperature",
                ..
            }
        ));
    }

    #[test]
    fn test_sensor_line_filter() {
        assert!(is_sensor_line("x, Temp: 1, Humidity: 2"));
        assert!(!is_sensor_line("File created and data written."));
        assert!(!is_sensor_line("Temp only: 4.2"));
    }

    #[test]
    fn test_batch_skips_malformed_and_preserves_order() {
        let lines = vec![
            "boot banner".to_string(),
            "t1, Temp: 5, Humidity: 50".to_string(),
            "t2, Temp: ???, Humidity: 50".to_string(),
            "t3, Temp: 6, Humidity: 51".to_string(),
        ];
        let diagnostics = DiagnosticsLog::new();

        let records = parse_lines(&lines, &diagnostics);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, "t1");
        assert_eq!(records[1].timestamp, "t3");

        let stats = diagnostics.stats();
        assert_eq!(stats.lines_skipped, 1);
        assert_eq!(stats.records_parsed, 2);
    }

    #[test]
    fn test_batch_reports_skipped_lines() {
        let lines = vec!["t, Temp: bad, Humidity: 1".to_string()];
        let diagnostics = DiagnosticsLog::new();
        let rx = diagnostics.messages();

        let records = parse_lines(&lines, &diagnostics);

        assert!(records.is_empty());
        let msg = rx.try_recv().unwrap();
        assert!(msg.contains("Skipping line"));
        assert!(msg.contains("Temp: bad"));
    }

    #[test]
    fn test_empty_batch() {
        let diagnostics = DiagnosticsLog::new();
        assert!(parse_lines(&[], &diagnostics).is_empty());
    }
}
