//! Background link reader.
//!
//! Owns the read side of the link on a dedicated thread: chunks go through
//! the line framer, completed lines are appended to the shared session
//! buffer in arrival order. The rest of the pipeline only ever polls the
//! buffer, so the producer is never blocked by a consumer.

use crate::core::{LineFramer, SharedSessionBuffer};
use crate::diagnostics::SharedDiagnosticsLog;
use crate::transport::link::{ChunkSource, LinkError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Pause between polls when the source has nothing to deliver.
const IDLE_WAIT: Duration = Duration::from_millis(5);

/// Errors that can occur when starting the reader.
#[derive(Debug)]
pub enum ReaderError {
    AlreadyRunning,
    SourceConsumed,
}

impl std::fmt::Display for ReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReaderError::AlreadyRunning => write!(f, "Reader is already running"),
            ReaderError::SourceConsumed => write!(f, "Reader was already started once"),
        }
    }
}

impl std::error::Error for ReaderError {}

/// Pumps a [`ChunkSource`] into the session buffer from a background thread.
pub struct LinkReader {
    source: Option<Box<dyn ChunkSource>>,
    buffer: SharedSessionBuffer,
    diagnostics: SharedDiagnosticsLog,
    running: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl LinkReader {
    /// Create a reader over the given source.
    pub fn new(
        source: Box<dyn ChunkSource>,
        buffer: SharedSessionBuffer,
        diagnostics: SharedDiagnosticsLog,
    ) -> Self {
        Self {
            source: Some(source),
            buffer,
            diagnostics,
            running: Arc::new(AtomicBool::new(false)),
            failed: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start pumping in a background thread.
    pub fn start(&mut self) -> Result<(), ReaderError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(ReaderError::AlreadyRunning);
        }
        let source = self.source.take().ok_or(ReaderError::SourceConsumed)?;

        self.running.store(true, Ordering::SeqCst);
        self.failed.store(false, Ordering::SeqCst);

        let buffer = self.buffer.clone();
        let diagnostics = self.diagnostics.clone();
        let running = self.running.clone();
        let failed = self.failed.clone();

        let handle = thread::spawn(move || {
            run_pump(source, &buffer, &diagnostics, &running, &failed);
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop pumping and join the thread.
    ///
    /// A read blocked on a quiet physical device returns at its next chunk
    /// (or when the device side closes); scripted and file sources return
    /// promptly.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Whether the pump thread is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether the link died with an error (as opposed to a clean close).
    pub fn link_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Shared flag that is `true` while the pump is alive.
    ///
    /// Waits poll this so a dead link cancels them instead of spinning
    /// forever on a buffer that will never grow.
    pub fn alive_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}

impl Drop for LinkReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_pump(
    mut source: Box<dyn ChunkSource>,
    buffer: &SharedSessionBuffer,
    diagnostics: &SharedDiagnosticsLog,
    running: &AtomicBool,
    failed: &AtomicBool,
) {
    tracing::info!("link reader started");
    let mut framer = LineFramer::new();

    while running.load(Ordering::SeqCst) {
        match source.read_chunk() {
            Ok(Some(chunk)) => {
                diagnostics.record_chunk();
                for line in framer.push_chunk(&chunk) {
                    buffer.append(line);
                    diagnostics.record_line_framed();
                }
            }
            Ok(None) => {
                thread::sleep(IDLE_WAIT);
            }
            Err(LinkError::Closed) => {
                tracing::info!("link closed");
                diagnostics.message("Serial link closed");
                break;
            }
            Err(e) => {
                tracing::error!("link error: {e}");
                diagnostics.message(format!("Serial link error: {e}"));
                failed.store(true, Ordering::SeqCst);
                break;
            }
        }
    }

    // Drain the unterminated tail so a dump without a final newline still
    // yields its last line.
    if let Some(line) = framer.finish() {
        buffer.append(line);
        diagnostics.record_line_framed();
    }

    tracing::info!("link reader stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::create_shared_buffer;
    use crate::diagnostics::create_shared_log;
    use crate::transport::mock;
    use std::time::Instant;

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) {
        let start = Instant::now();
        while !done() {
            assert!(start.elapsed() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_reader_appends_framed_lines_in_order() {
        let (source, _sink, handle) = mock::scripted(
            vec![b"alpha\nbe".to_vec(), b"ta\ngamma\n".to_vec()],
            Vec::new(),
        );
        let buffer = create_shared_buffer();
        let diagnostics = create_shared_log();
        let mut reader = LinkReader::new(Box::new(source), buffer.clone(), diagnostics.clone());

        reader.start().unwrap();
        wait_until(Duration::from_secs(2), || {
            handle.drained() && buffer.len() == 3
        });
        reader.stop();

        assert_eq!(buffer.snapshot(), vec!["alpha", "beta", "gamma"]);
        assert_eq!(diagnostics.stats().lines_framed, 3);
    }

    #[test]
    fn test_stop_flushes_carry_over() {
        let (source, _sink, handle) =
            mock::scripted(vec![b"complete\npartial tail".to_vec()], Vec::new());
        let buffer = create_shared_buffer();
        let mut reader = LinkReader::new(Box::new(source), buffer.clone(), create_shared_log());

        reader.start().unwrap();
        wait_until(Duration::from_secs(2), || {
            handle.drained() && buffer.len() == 1
        });
        reader.stop();

        assert_eq!(buffer.snapshot(), vec!["complete", "partial tail"]);
    }

    #[test]
    fn test_link_error_marks_failure_and_stops() {
        let (source, _sink, handle) = mock::scripted(vec![b"last\n".to_vec()], Vec::new());
        handle.fail_with(LinkError::Io("cable pulled".to_string()));

        let buffer = create_shared_buffer();
        let diagnostics = create_shared_log();
        let rx = diagnostics.messages();
        let mut reader = LinkReader::new(Box::new(source), buffer.clone(), diagnostics);

        reader.start().unwrap();
        wait_until(Duration::from_secs(2), || !reader.is_running());

        assert!(reader.link_failed());
        assert_eq!(buffer.snapshot(), vec!["last"]);
        let reported = rx.try_iter().any(|m| m.contains("cable pulled"));
        assert!(reported);
    }

    #[test]
    fn test_start_twice_is_an_error() {
        let (source, _sink, _handle) = mock::scripted(Vec::new(), Vec::new());
        let mut reader =
            LinkReader::new(Box::new(source), create_shared_buffer(), create_shared_log());

        reader.start().unwrap();
        assert!(matches!(reader.start(), Err(ReaderError::AlreadyRunning)));
        reader.stop();
    }
}
