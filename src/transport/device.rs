//! Link over an already-configured device node.
//!
//! Opens a serial device path (or a capture file) as plain file handles:
//! one for reading chunks, one for writing the command byte. Baud rate,
//! parity and friends are expected to be set externally (e.g. `stty -F
//! /dev/ttyUSB0 9600 raw`) before this link is opened; the port
//! configuration lifecycle is deliberately outside this crate.

use crate::transport::link::{ChunkSource, CommandSink, LinkError};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

/// Size of the read buffer per chunk.
const CHUNK_CAPACITY: usize = 256;

/// Read half of a device link.
#[derive(Debug)]
pub struct DeviceSource {
    file: File,
}

/// Write half of a device link.
#[derive(Debug)]
pub struct DeviceSink {
    file: File,
}

/// Open both halves of a link over the given device path.
pub fn open(path: &Path) -> Result<(DeviceSource, DeviceSink), LinkError> {
    let reader = File::open(path).map_err(|e| LinkError::Io(format!("{}: {e}", path.display())))?;
    let writer = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| LinkError::Io(format!("{}: {e}", path.display())))?;

    Ok((DeviceSource { file: reader }, DeviceSink { file: writer }))
}

impl ChunkSource for DeviceSource {
    fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, LinkError> {
        let mut buf = [0u8; CHUNK_CAPACITY];
        match self.file.read(&mut buf) {
            Ok(0) => Err(LinkError::Closed),
            Ok(n) => Ok(Some(buf[..n].to_vec())),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(LinkError::Io(e.to_string())),
        }
    }
}

impl CommandSink for DeviceSink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.file
            .write_all(bytes)
            .and_then(|()| self.file.flush())
            .map_err(|e| LinkError::Io(e.to_string()))
    }
}
