//! Export table assembly.
//!
//! Builds the row set handed to an external tabular writer: a fixed header
//! plus one row per parsed record with a 1-based index and the two derived
//! chill-unit columns. The container format (workbook, CSV, whatever the
//! writer produces) is not this module's concern.

use crate::core::chill::ChillAccumulator;
use crate::core::parser::ParsedRecord;
use serde::{Deserialize, Serialize};

/// Column label for the per-row chill-unit score.
pub const CHILL_UNIT_LABEL: &str = "Utah";

/// Export header, in column order.
pub const EXPORT_HEADER: [&str; 6] = [
    "#",
    "Timestamp",
    "Temp (°C)",
    "Humidity (%)",
    "Utah",
    "Cumulative Utah",
];

/// One export row. Valid only relative to the ordered record list it was
/// built from: both the index and the cumulative column are positional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    /// 1-based row number
    pub index: usize,
    #[serde(flatten)]
    pub record: ParsedRecord,
    /// Chill units contributed by this row's temperature
    pub chill_units: f64,
    /// Sum of chill units over rows 1..=index
    pub cumulative_chill_units: f64,
}

/// Header plus data rows, ready for a tabular writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportTable {
    pub header: Vec<String>,
    pub rows: Vec<ExportRow>,
}

impl ExportTable {
    /// Whether the table carries no data rows (header-only).
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Human-readable one-line-per-row preview of the parsed batch.
    pub fn preview_lines(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| {
                format!(
                    "{}. {} — {}°C — {}%",
                    row.index, row.record.timestamp, row.record.temperature_c, row.record.humidity_pct
                )
            })
            .collect()
    }
}

/// Build the export table for an ordered record batch.
///
/// Row order equals record order equals arrival order; the cumulative
/// column is a single-pass running sum.
pub fn build_table(records: &[ParsedRecord]) -> ExportTable {
    let mut accumulator = ChillAccumulator::new();

    let rows = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let chill_units = accumulator.push(record.temperature_c);
            ExportRow {
                index: i + 1,
                record: record.clone(),
                chill_units,
                cumulative_chill_units: accumulator.total(),
            }
        })
        .collect();

    ExportTable {
        header: EXPORT_HEADER.iter().map(|h| h.to_string()).collect(),
        rows,
    }
}
