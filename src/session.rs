//! Session flow: wait for the trigger, request the dump, recover records.
//!
//! A session is one trigger → read → export cycle against a connected
//! device. The reader thread keeps filling the shared buffer on its own;
//! this module is the consumer side that polls the buffer for markers,
//! issues the read command and turns the collected lines into an export
//! table. Every wait is cancellable so a torn-down session never leaks a
//! spinning poll loop.

use crate::config::Config;
use crate::core::{
    build_table, parse_lines, ExportTable, ParsedRecord, SessionBuffer, SharedSessionBuffer,
};
use crate::diagnostics::SharedDiagnosticsLog;
use crate::transport::link::{CommandSink, LinkError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// File holding the raw lines of the last completed session.
pub const SESSION_LINES_FILE: &str = "last_session.log";

/// File holding the summary of the last completed session.
pub const SESSION_SUMMARY_FILE: &str = "last_session.json";

/// A marker wait ended without the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    Cancelled,
}

impl std::fmt::Display for WaitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitError::Cancelled => write!(f, "wait cancelled before marker appeared"),
        }
    }
}

impl std::error::Error for WaitError {}

/// Errors that end a session cycle.
#[derive(Debug)]
pub enum SessionError {
    /// Writing the read command failed. Terminal for this session.
    Write(LinkError),
    /// The session was torn down mid-wait. Not data, not retried here.
    Cancelled,
    /// The link reader died while a wait was in progress.
    LinkDown,
    /// No persisted session data to rebuild from.
    NoSession(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Write(e) => write!(f, "failed to send read command: {e}"),
            SessionError::Cancelled => write!(f, "session cancelled"),
            SessionError::LinkDown => write!(f, "serial link went down"),
            SessionError::NoSession(e) => write!(f, "no session data: {e}"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Poll the buffer until a line containing `marker` appears.
///
/// Checks every `poll` interval; returns `Err(Cancelled)` once `cancelled`
/// reports true. A marker that is already present wins over a concurrent
/// cancellation. No timeout is imposed; callers layer their own if they
/// need one.
pub fn wait_for_marker(
    buffer: &SessionBuffer,
    marker: &str,
    poll: Duration,
    cancelled: impl Fn() -> bool,
) -> Result<(), WaitError> {
    loop {
        if buffer.contains(marker) {
            return Ok(());
        }
        if cancelled() {
            return Err(WaitError::Cancelled);
        }
        std::thread::sleep(poll);
    }
}

/// Summary of one completed session, persisted next to its raw lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub host: String,
    pub completed_at: DateTime<Utc>,
    pub line_count: usize,
    pub record_count: usize,
}

/// Drives trigger waits and read cycles against a running link reader.
pub struct SessionRunner {
    buffer: SharedSessionBuffer,
    sink: Box<dyn CommandSink>,
    diagnostics: SharedDiagnosticsLog,
    config: Config,
    cancel: Arc<AtomicBool>,
    link_alive: Arc<AtomicBool>,
}

impl SessionRunner {
    /// Create a runner.
    ///
    /// `link_alive` is the reader's alive flag; waits abort with
    /// [`SessionError::LinkDown`] once it goes false.
    pub fn new(
        buffer: SharedSessionBuffer,
        sink: Box<dyn CommandSink>,
        diagnostics: SharedDiagnosticsLog,
        config: Config,
        link_alive: Arc<AtomicBool>,
    ) -> Self {
        Self {
            buffer,
            sink,
            diagnostics,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            link_alive,
        }
    }

    /// Flag that cancels any in-progress or future wait when set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Block until the device reports it has data ready.
    pub fn wait_for_trigger(&self) -> Result<(), SessionError> {
        self.diagnostics
            .message(format!("Waiting for trigger: {}", self.config.trigger_marker));
        self.wait_for(&self.config.trigger_marker)?;
        self.diagnostics.message("Trigger detected");
        Ok(())
    }

    /// Run one read cycle: send the command byte, collect until the end
    /// marker, parse the snapshot.
    ///
    /// The buffer is cleared after the command is written, so everything
    /// in the returned batch belongs to this cycle. Raw lines and a
    /// summary are persisted best-effort for later re-export.
    pub fn read_log(&mut self) -> Result<Vec<ParsedRecord>, SessionError> {
        self.diagnostics.message(format!(
            "Sending '{}' to logger...",
            self.config.read_command as char
        ));
        if let Err(e) = self.sink.write(&[self.config.read_command]) {
            self.diagnostics.message(format!("Write failed: {e}"));
            return Err(SessionError::Write(e));
        }

        self.buffer.clear();

        self.wait_for(&self.config.end_marker)?;

        let lines = self.buffer.snapshot();
        self.diagnostics.message(format!(
            "End of file detected; parsing {} lines",
            lines.len()
        ));

        let records = parse_lines(&lines, &self.diagnostics);
        self.diagnostics
            .message(format!("Parsed {} rows", records.len()));
        self.diagnostics.record_session_completed();

        if let Err(e) = persist_session(&self.config.data_path, &lines, &records) {
            tracing::warn!("could not persist session data: {e}");
            self.diagnostics
                .message(format!("Warning: could not save session data: {e}"));
        }

        Ok(records)
    }

    /// Full automatic cycle: wait for the trigger, read, build the table.
    pub fn auto_cycle(&mut self) -> Result<ExportTable, SessionError> {
        self.diagnostics.message("Auto: wait -> read -> export");
        self.wait_for_trigger()?;
        let records = self.read_log()?;
        Ok(build_table(&records))
    }

    fn wait_for(&self, marker: &str) -> Result<(), SessionError> {
        let cancel = self.cancel.clone();
        let alive = self.link_alive.clone();

        wait_for_marker(&self.buffer, marker, self.config.poll_interval, || {
            cancel.load(Ordering::SeqCst) || !alive.load(Ordering::SeqCst)
        })
        .map_err(|_| {
            if self.cancel.load(Ordering::SeqCst) {
                SessionError::Cancelled
            } else {
                SessionError::LinkDown
            }
        })
    }
}

/// Write the session's raw lines and summary under `data_path`.
fn persist_session(
    data_path: &Path,
    lines: &[String],
    records: &[ParsedRecord],
) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(data_path)?;
    std::fs::write(data_path.join(SESSION_LINES_FILE), lines.join("\n"))?;

    let summary = SessionSummary {
        session_id: Uuid::new_v4(),
        host: hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string()),
        completed_at: Utc::now(),
        line_count: lines.len(),
        record_count: records.len(),
    };
    let json = serde_json::to_string_pretty(&summary).map_err(std::io::Error::other)?;
    std::fs::write(data_path.join(SESSION_SUMMARY_FILE), json)?;

    Ok(())
}

/// Load the raw lines of the last persisted session.
pub fn load_last_session(data_path: &Path) -> Result<Vec<String>, SessionError> {
    let path = data_path.join(SESSION_LINES_FILE);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| SessionError::NoSession(format!("{}: {e}", path.display())))?;
    Ok(content.lines().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::create_shared_buffer;
    use crate::diagnostics::create_shared_log;
    use crate::transport::mock;
    use std::thread;

    fn test_config(data_path: &Path) -> Config {
        let mut config = Config::default();
        config.poll_interval = Duration::from_millis(5);
        config.data_path = data_path.to_path_buf();
        config.export_path = data_path.join("exports");
        config
    }

    #[test]
    fn test_wait_resolves_when_marker_appended() {
        let buffer = create_shared_buffer();
        buffer.append("noise".to_string());

        let waiter = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                wait_for_marker(
                    &buffer,
                    "File created and data written.",
                    Duration::from_millis(5),
                    || false,
                )
            })
        };

        thread::sleep(Duration::from_millis(30));
        assert!(!waiter.is_finished(), "wait must not resolve on noise alone");

        buffer.append("File created and data written.".to_string());
        buffer.append("more".to_string());
        assert_eq!(waiter.join().unwrap(), Ok(()));
    }

    #[test]
    fn test_wait_cancellation_yields_no_result() {
        let buffer = create_shared_buffer();
        let cancel = Arc::new(AtomicBool::new(false));

        let waiter = {
            let buffer = buffer.clone();
            let cancel = cancel.clone();
            thread::spawn(move || {
                wait_for_marker(&buffer, "never", Duration::from_millis(5), || {
                    cancel.load(Ordering::SeqCst)
                })
            })
        };

        cancel.store(true, Ordering::SeqCst);
        assert_eq!(waiter.join().unwrap(), Err(WaitError::Cancelled));
    }

    #[test]
    fn test_present_marker_wins_over_cancellation() {
        let buffer = create_shared_buffer();
        buffer.append("marker already here".to_string());

        let result = wait_for_marker(&buffer, "marker", Duration::from_millis(5), || true);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_read_log_collects_post_clear_lines_only() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = create_shared_buffer();
        let (_source, sink, handle) = mock::scripted(Vec::new(), Vec::new());
        let alive = Arc::new(AtomicBool::new(true));

        // Stale pre-trigger chatter that a read cycle must discard.
        buffer.append("File created and data written.".to_string());
        buffer.append("t0, Temp: 99, Humidity: 99".to_string());

        let feeder = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                buffer.append("t1, Temp: 5.0°C, Humidity: 60%".to_string());
                buffer.append("garbled###".to_string());
                buffer.append("t2, Temp: 20.0°C, Humidity: 55%".to_string());
                buffer.append("--- END OF FILE ---".to_string());
            })
        };

        let mut runner = SessionRunner::new(
            buffer.clone(),
            Box::new(sink),
            create_shared_log(),
            test_config(dir.path()),
            alive,
        );

        let records = runner.read_log().unwrap();
        feeder.join().unwrap();

        assert_eq!(handle.written(), vec![b"l".to_vec()]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, "t1");
        assert_eq!(records[1].timestamp, "t2");
        assert!(!records.iter().any(|r| r.temperature_c == 99.0));

        // Raw lines and summary were persisted for re-export.
        let lines = load_last_session(dir.path()).unwrap();
        assert_eq!(lines.len(), 4);
        let summary: SessionSummary = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(SESSION_SUMMARY_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(summary.record_count, 2);
        assert_eq!(summary.line_count, 4);
    }

    #[test]
    fn test_read_log_fails_when_write_fails() {
        struct BrokenSink;
        impl CommandSink for BrokenSink {
            fn write(&mut self, _bytes: &[u8]) -> Result<(), LinkError> {
                Err(LinkError::Io("unplugged".to_string()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let buffer = create_shared_buffer();
        buffer.append("prior state".to_string());

        let mut runner = SessionRunner::new(
            buffer.clone(),
            Box::new(BrokenSink),
            create_shared_log(),
            test_config(dir.path()),
            Arc::new(AtomicBool::new(true)),
        );

        assert!(matches!(runner.read_log(), Err(SessionError::Write(_))));
        // A failed write leaves prior state untouched.
        assert_eq!(buffer.snapshot(), vec!["prior state"]);
    }

    #[test]
    fn test_dead_link_aborts_wait() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = create_shared_buffer();
        let (_source, sink, _handle) = mock::scripted(Vec::new(), Vec::new());
        let alive = Arc::new(AtomicBool::new(false));

        let mut runner = SessionRunner::new(
            buffer,
            Box::new(sink),
            create_shared_log(),
            test_config(dir.path()),
            alive,
        );

        assert!(matches!(runner.read_log(), Err(SessionError::LinkDown)));
    }

    #[test]
    fn test_cancelled_runner_reports_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = create_shared_buffer();
        let (_source, sink, _handle) = mock::scripted(Vec::new(), Vec::new());

        let runner = SessionRunner::new(
            buffer,
            Box::new(sink),
            create_shared_log(),
            test_config(dir.path()),
            Arc::new(AtomicBool::new(true)),
        );
        runner.cancel_flag().store(true, Ordering::SeqCst);

        assert!(matches!(
            runner.wait_for_trigger(),
            Err(SessionError::Cancelled)
        ));
    }

    #[test]
    fn test_load_last_session_missing_is_no_session() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_last_session(dir.path()),
            Err(SessionError::NoSession(_))
        ));
    }
}
