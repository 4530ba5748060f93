//! Transport seam.
//!
//! The pipeline consumes raw bytes and writes a single command byte; how
//! the underlying serial connection is discovered, opened and configured is
//! somebody else's problem. These two traits are the entire contract with
//! that somebody.

/// Errors surfaced by a serial link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The underlying transport failed. Terminal for the current session.
    Io(String),
    /// The link ended (device unplugged, fixture exhausted).
    Closed,
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkError::Io(e) => write!(f, "link I/O error: {e}"),
            LinkError::Closed => write!(f, "link closed"),
        }
    }
}

impl std::error::Error for LinkError {}

/// Read side of a serial link: an unbounded source of raw byte chunks.
///
/// Chunks carry no framing guarantee; they may split or merge lines
/// arbitrarily. `Ok(None)` means "nothing available right now" and lets
/// the caller's loop stay responsive to shutdown; `Err(LinkError::Closed)`
/// means no further chunks will ever arrive.
pub trait ChunkSource: Send {
    /// Read the next chunk, if any.
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, LinkError>;
}

/// Write side of a serial link, used for the read-command byte.
pub trait CommandSink: Send {
    /// Write the given bytes to the device.
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError>;
}
