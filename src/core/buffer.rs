//! Shared line log for the current session.
//!
//! One writer (the link reader thread) appends framed lines; any number of
//! readers poll for markers or take snapshots. A single mutex guards the
//! log, so `clear` is serialized against both `append` and `snapshot` and
//! readers never observe a torn mutation.

use std::sync::{Arc, Mutex};

/// Append-only log of received lines, cleared at the start of a read cycle.
#[derive(Debug, Default)]
pub struct SessionBuffer {
    lines: Mutex<Vec<String>>,
}

impl SessionBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one framed line in arrival order.
    pub fn append(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }

    /// Copy of the current contents, in insertion order.
    ///
    /// The copy is detached: later appends or clears never affect it.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Drop every stored line. Invoked when a new read cycle starts.
    pub fn clear(&self) {
        self.lines.lock().unwrap().clear();
    }

    /// Whether any stored line contains the given substring.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|l| l.contains(needle))
    }

    /// Number of stored lines.
    pub fn len(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    /// Whether the buffer holds no lines.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Thread-safe shared session buffer.
pub type SharedSessionBuffer = Arc<SessionBuffer>;

/// Create a new shared session buffer.
pub fn create_shared_buffer() -> SharedSessionBuffer {
    Arc::new(SessionBuffer::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_append_preserves_order() {
        let buffer = SessionBuffer::new();
        buffer.append("first".to_string());
        buffer.append("second".to_string());
        buffer.append("third".to_string());

        assert_eq!(buffer.snapshot(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let buffer = SessionBuffer::new();
        buffer.append("kept".to_string());

        let snapshot = buffer.snapshot();
        buffer.clear();
        buffer.append("later".to_string());

        assert_eq!(snapshot, vec!["kept"]);
        assert_eq!(buffer.snapshot(), vec!["later"]);
    }

    #[test]
    fn test_contains_substring() {
        let buffer = SessionBuffer::new();
        buffer.append("noise".to_string());
        assert!(!buffer.contains("END OF FILE"));

        buffer.append("--- END OF FILE ---".to_string());
        assert!(buffer.contains("END OF FILE"));
    }

    #[test]
    fn test_clear_never_mixes_generations() {
        let buffer = SessionBuffer::new();
        buffer.append("old-1".to_string());
        buffer.append("old-2".to_string());

        buffer.clear();
        buffer.append("new-1".to_string());

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot, vec!["new-1"]);
        assert!(!snapshot.iter().any(|l| l.starts_with("old")));
    }

    #[test]
    fn test_concurrent_writer_and_readers() {
        let buffer = create_shared_buffer();

        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    buffer.append(format!("line-{i}"));
                }
            })
        };

        let reader = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                // Snapshots taken mid-write must always be a prefix of the
                // final sequence, never a reordering.
                for _ in 0..100 {
                    let snapshot = buffer.snapshot();
                    for (i, line) in snapshot.iter().enumerate() {
                        assert_eq!(line, &format!("line-{i}"));
                    }
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(buffer.len(), 1000);
    }
}
