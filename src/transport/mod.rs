//! Serial transport layer.
//!
//! Defines the byte-level seam the pipeline sits on ([`ChunkSource`] /
//! [`CommandSink`]), a link over an already-configured device node, a
//! scripted link for tests and demos, and the background reader that pumps
//! chunks into the session buffer.

pub mod device;
pub mod link;
pub mod mock;
pub mod reader;

// Re-export commonly used types
pub use link::{ChunkSource, CommandSink, LinkError};
pub use reader::{LinkReader, ReaderError};
