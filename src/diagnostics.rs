//! Progress and skipped-line reporting.
//!
//! The pipeline reports what it is doing (and what it dropped) through a
//! bounded channel of human-readable messages plus a set of counters. The
//! channel is fed with `try_send`, so a slow or absent consumer never
//! blocks the reader thread or a read cycle; overflowed messages are
//! counted, not waited on.

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Capacity of the message channel before messages are dropped.
const MESSAGE_CAPACITY: usize = 1024;

/// Counters and message channel for one running pipeline.
#[derive(Debug)]
pub struct DiagnosticsLog {
    /// Raw chunks received from the link
    chunks_received: AtomicU64,
    /// Lines emitted by the framer
    lines_framed: AtomicU64,
    /// Malformed lines dropped by the parser
    lines_skipped: AtomicU64,
    /// Records successfully parsed
    records_parsed: AtomicU64,
    /// Read cycles completed
    sessions_completed: AtomicU64,
    /// Export tables built
    tables_exported: AtomicU64,
    /// Messages dropped because the channel was full
    dropped_messages: AtomicU64,
    /// Log creation time
    started: DateTime<Utc>,
    /// Path for persisting counters
    persist_path: Option<PathBuf>,
    sender: Sender<String>,
    receiver: Receiver<String>,
}

impl DiagnosticsLog {
    /// Create a new diagnostics log.
    pub fn new() -> Self {
        let (sender, receiver) = bounded(MESSAGE_CAPACITY);
        Self {
            chunks_received: AtomicU64::new(0),
            lines_framed: AtomicU64::new(0),
            lines_skipped: AtomicU64::new(0),
            records_parsed: AtomicU64::new(0),
            sessions_completed: AtomicU64::new(0),
            tables_exported: AtomicU64::new(0),
            dropped_messages: AtomicU64::new(0),
            started: Utc::now(),
            persist_path: None,
            sender,
            receiver,
        }
    }

    /// Create a diagnostics log whose counters persist across runs.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::debug!("no previous diagnostics stats loaded: {e}");
        }

        log
    }

    /// Queue a human-readable progress message without blocking.
    ///
    /// If no consumer is keeping up, the message is dropped and counted.
    pub fn message(&self, text: impl Into<String>) {
        if self.sender.try_send(text.into()).is_err() {
            self.dropped_messages.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Receiver end of the message channel for the presentation layer.
    pub fn messages(&self) -> Receiver<String> {
        self.receiver.clone()
    }

    /// Record a received chunk.
    pub fn record_chunk(&self) {
        self.chunks_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one framed line.
    pub fn record_line_framed(&self) {
        self.lines_framed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a malformed line dropped by the parser.
    pub fn record_line_skipped(&self) {
        self.lines_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record successfully parsed records.
    pub fn record_records_parsed(&self, count: u64) {
        self.records_parsed.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a completed read cycle.
    pub fn record_session_completed(&self) {
        self.sessions_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a built export table.
    pub fn record_table_exported(&self) {
        self.tables_exported.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> DiagnosticsStats {
        DiagnosticsStats {
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            lines_framed: self.lines_framed.load(Ordering::Relaxed),
            lines_skipped: self.lines_skipped.load(Ordering::Relaxed),
            records_parsed: self.records_parsed.load(Ordering::Relaxed),
            sessions_completed: self.sessions_completed.load(Ordering::Relaxed),
            tables_exported: self.tables_exported.load(Ordering::Relaxed),
            dropped_messages: self.dropped_messages.load(Ordering::Relaxed),
            started: self.started,
            uptime_secs: (Utc::now() - self.started).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Pipeline Statistics:\n\
             - Chunks received: {}\n\
             - Lines framed: {}\n\
             - Lines skipped (malformed): {}\n\
             - Records parsed: {}\n\
             - Read cycles completed: {}\n\
             - Tables exported: {}\n\
             - Uptime: {} seconds",
            stats.chunks_received,
            stats.lines_framed,
            stats.lines_skipped,
            stats.records_parsed,
            stats.sessions_completed,
            stats.tables_exported,
            stats.uptime_secs
        )
    }

    /// Save counters to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                chunks_received: stats.chunks_received,
                lines_framed: stats.lines_framed,
                lines_skipped: stats.lines_skipped,
                records_parsed: stats.records_parsed,
                sessions_completed: stats.sessions_completed,
                tables_exported: stats.tables_exported,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load counters from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.chunks_received
                    .store(persisted.chunks_received, Ordering::Relaxed);
                self.lines_framed
                    .store(persisted.lines_framed, Ordering::Relaxed);
                self.lines_skipped
                    .store(persisted.lines_skipped, Ordering::Relaxed);
                self.records_parsed
                    .store(persisted.records_parsed, Ordering::Relaxed);
                self.sessions_completed
                    .store(persisted.sessions_completed, Ordering::Relaxed);
                self.tables_exported
                    .store(persisted.tables_exported, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.chunks_received.store(0, Ordering::Relaxed);
        self.lines_framed.store(0, Ordering::Relaxed);
        self.lines_skipped.store(0, Ordering::Relaxed);
        self.records_parsed.store(0, Ordering::Relaxed);
        self.sessions_completed.store(0, Ordering::Relaxed);
        self.tables_exported.store(0, Ordering::Relaxed);
        self.dropped_messages.store(0, Ordering::Relaxed);
    }
}

impl Default for DiagnosticsLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of diagnostics counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsStats {
    pub chunks_received: u64,
    pub lines_framed: u64,
    pub lines_skipped: u64,
    pub records_parsed: u64,
    pub sessions_completed: u64,
    pub tables_exported: u64,
    pub dropped_messages: u64,
    pub started: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Counter format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    chunks_received: u64,
    lines_framed: u64,
    lines_skipped: u64,
    records_parsed: u64,
    sessions_completed: u64,
    tables_exported: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared diagnostics log.
pub type SharedDiagnosticsLog = Arc<DiagnosticsLog>;

/// Create a new shared diagnostics log.
pub fn create_shared_log() -> SharedDiagnosticsLog {
    Arc::new(DiagnosticsLog::new())
}

/// Create a new shared diagnostics log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedDiagnosticsLog {
    Arc::new(DiagnosticsLog::with_persistence(path))
}
