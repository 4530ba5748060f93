//! Orchardlog - serial session logger for chill-unit tracking.
//!
//! This library ingests the byte stream of a serial-connected data logger,
//! reassembles it into lines, waits for the firmware's session markers,
//! parses temperature/humidity readings and builds a chill-unit export
//! table for a tabular writer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Orchardlog                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌──────────┐   ┌───────────────┐            │
//! │  │   Link   │──▶│  Framer  │──▶│ SessionBuffer │            │
//! │  │ (reader) │   │ (lines)  │   │ (shared log)  │            │
//! │  └──────────┘   └──────────┘   └───────┬───────┘            │
//! │                                        │ poll / snapshot     │
//! │                                ┌───────▼───────┐            │
//! │                                │ SessionRunner │            │
//! │                                │ (wait, read)  │            │
//! │                                └───────┬───────┘            │
//! │                     ┌──────────┐       │      ┌───────────┐ │
//! │                     │  Parser  │◀──────┴─────▶│  Export   │ │
//! │                     │ (records)│              │  (table)  │ │
//! │                     └──────────┘              └───────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The link reader runs on a background thread and appends lines in
//! arrival order; everything else runs as short-lived, cancellable
//! consumer steps that poll the buffer. Malformed lines are skipped with a
//! diagnostic, never fatal; only transport failures end a session.
//!
//! # Example
//!
//! ```no_run
//! use orchardlog::core::create_shared_buffer;
//! use orchardlog::diagnostics::create_shared_log;
//! use orchardlog::transport::{device, LinkReader};
//!
//! let (source, _sink) = device::open(std::path::Path::new("/dev/ttyUSB0"))
//!     .expect("Failed to open device");
//!
//! let buffer = create_shared_buffer();
//! let diagnostics = create_shared_log();
//! let mut reader = LinkReader::new(Box::new(source), buffer.clone(), diagnostics);
//! reader.start().expect("Failed to start reader");
//!
//! // Lines accumulate in `buffer`; poll it for the session markers.
//! ```

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod session;
pub mod transport;

// Re-export key types at crate root for convenience
pub use config::Config;
pub use core::{
    build_table, chill_units, parse_line, parse_lines, ChillAccumulator, ExportRow, ExportTable,
    LineFramer, ParseError, ParsedRecord, SessionBuffer, SharedSessionBuffer,
};
pub use diagnostics::{DiagnosticsLog, DiagnosticsStats, SharedDiagnosticsLog};
pub use session::{
    load_last_session, wait_for_marker, SessionError, SessionRunner, SessionSummary, WaitError,
};
pub use transport::{ChunkSource, CommandSink, LinkError, LinkReader};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
