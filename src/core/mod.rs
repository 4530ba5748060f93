//! Core ingestion and transform pipeline.
//!
//! This module contains:
//! - Line framing from raw byte chunks
//! - The shared session line buffer
//! - Record parsing with skip-tolerant batch recovery
//! - Chill-unit scoring and the export table builder

pub mod buffer;
pub mod chill;
pub mod export;
pub mod framer;
pub mod parser;

// Re-export commonly used types
pub use buffer::{create_shared_buffer, SessionBuffer, SharedSessionBuffer};
pub use chill::{chill_units, ChillAccumulator};
pub use export::{build_table, ExportRow, ExportTable, CHILL_UNIT_LABEL, EXPORT_HEADER};
pub use framer::LineFramer;
pub use parser::{is_sensor_line, parse_line, parse_lines, ParseError, ParsedRecord};
