//! Scripted link for tests and demos.
//!
//! Plays the role of the data logger: a preamble script is served chunk by
//! chunk (boot noise, the trigger line), then nothing until the read
//! command arrives, then the dump script (log lines, the end marker).
//! Every write is recorded so tests can assert on the command protocol.

use crate::transport::link::{ChunkSource, CommandSink, LinkError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MockState {
    /// Chunks ready to be served to the reader
    pending: VecDeque<Vec<u8>>,
    /// Chunks released when the first command byte arrives
    on_command: VecDeque<Vec<u8>>,
    /// Everything written through the sink, in order
    written: Vec<Vec<u8>>,
    /// Simulated link failure
    failure: Option<LinkError>,
}

/// Read half of the scripted link.
pub struct MockSource {
    state: Arc<Mutex<MockState>>,
}

/// Write half of the scripted link.
pub struct MockSink {
    state: Arc<Mutex<MockState>>,
}

/// Test-side handle for inspecting and steering a scripted link.
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

/// Build a scripted link.
///
/// `preamble` chunks are served immediately; `on_command` chunks become
/// available once any bytes are written to the sink.
pub fn scripted(
    preamble: Vec<Vec<u8>>,
    on_command: Vec<Vec<u8>>,
) -> (MockSource, MockSink, MockHandle) {
    let state = Arc::new(Mutex::new(MockState {
        pending: preamble.into(),
        on_command: on_command.into(),
        written: Vec::new(),
        failure: None,
    }));

    (
        MockSource {
            state: state.clone(),
        },
        MockSink {
            state: state.clone(),
        },
        MockHandle { state },
    )
}

impl ChunkSource for MockSource {
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, LinkError> {
        let mut state = self.state.lock().unwrap();
        if let Some(chunk) = state.pending.pop_front() {
            return Ok(Some(chunk));
        }
        if let Some(failure) = state.failure.take() {
            return Err(failure);
        }
        Ok(None)
    }
}

impl CommandSink for MockSink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut state = self.state.lock().unwrap();
        state.written.push(bytes.to_vec());

        // The device starts its dump on the first command it sees.
        let released: Vec<Vec<u8>> = state.on_command.drain(..).collect();
        state.pending.extend(released);
        Ok(())
    }
}

impl MockHandle {
    /// Everything written to the sink so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().written.clone()
    }

    /// Queue an additional chunk for immediate delivery.
    pub fn push_chunk(&self, chunk: Vec<u8>) {
        self.state.lock().unwrap().pending.push_back(chunk);
    }

    /// Make the source fail once its pending chunks are drained.
    pub fn fail_with(&self, error: LinkError) {
        self.state.lock().unwrap().failure = Some(error);
    }

    /// Whether all scripted chunks have been served.
    pub fn drained(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.pending.is_empty() && state.on_command.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble_served_in_order() {
        let (mut source, _sink, _handle) =
            scripted(vec![b"one".to_vec(), b"two".to_vec()], Vec::new());

        assert_eq!(source.read_chunk().unwrap(), Some(b"one".to_vec()));
        assert_eq!(source.read_chunk().unwrap(), Some(b"two".to_vec()));
        assert_eq!(source.read_chunk().unwrap(), None);
    }

    #[test]
    fn test_dump_gated_on_command() {
        let (mut source, mut sink, handle) =
            scripted(Vec::new(), vec![b"data\n".to_vec()]);

        assert_eq!(source.read_chunk().unwrap(), None);

        sink.write(b"l").unwrap();
        assert_eq!(source.read_chunk().unwrap(), Some(b"data\n".to_vec()));
        assert_eq!(handle.written(), vec![b"l".to_vec()]);
        assert!(handle.drained());
    }

    #[test]
    fn test_scripted_failure_after_drain() {
        let (mut source, _sink, handle) = scripted(vec![b"x".to_vec()], Vec::new());
        handle.fail_with(LinkError::Io("yanked".to_string()));

        assert_eq!(source.read_chunk().unwrap(), Some(b"x".to_vec()));
        assert_eq!(
            source.read_chunk().unwrap_err(),
            LinkError::Io("yanked".to_string())
        );
    }
}
