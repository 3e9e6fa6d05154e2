//! Length-prefixed command framing.
//!
//! Commands are framed with a 4-byte big-endian length prefix followed by
//! the JSON payload:
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  JSON payload    |
//! +----------------+------------------+
//! ```
//!
//! Chat connections are persistent, so a closed stream is never a normal
//! decode outcome: end-of-stream surfaces as
//! [`ProtocolError::ConnectionClosed`]. `Ok(None)` is reserved for the
//! *absent* case, a complete frame whose payload did not resolve into a
//! known [`Command`]. Callers treat absent as a no-op and keep reading.

use std::io::{Read, Write};

use crate::MAX_FRAME_SIZE;
use crate::command::Command;
use crate::error::{ProtocolError, ProtocolResult};

/// Encodes a command to bytes with length prefix.
///
/// Returns the complete framed command ready for transmission.
///
/// # Example
///
/// ```rust
/// use natter_protocol::{Command, encode_command};
///
/// let bytes = encode_command(&Command::End).unwrap();
/// assert!(bytes.len() > 4); // At least length prefix
/// ```
pub fn encode_command(command: &Command) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(command)?;
    let len = json.len() as u32;

    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut buffer = Vec::with_capacity(4 + json.len());
    buffer.extend_from_slice(&len.to_be_bytes());
    buffer.extend_from_slice(&json);
    Ok(buffer)
}

/// Reads framed commands from a byte stream.
pub struct FrameReader<R> {
    reader: R,
}

impl<R: Read> FrameReader<R> {
    /// Creates a new FrameReader wrapping the given reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads a single framed command, blocking until one full frame is
    /// available or the stream fails.
    ///
    /// Returns `Ok(None)` (absent) for a complete frame that did not
    /// deserialize into a known command, including empty frames. Returns
    /// [`ProtocolError::ConnectionClosed`] if the stream ends, whether at
    /// a frame boundary or mid-frame.
    pub fn read_command(&mut self) -> ProtocolResult<Option<Command>> {
        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ProtocolError::ConnectionClosed);
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_FRAME_SIZE as usize {
            // A length this large means the stream is desynchronized.
            return Err(ProtocolError::FrameTooLarge {
                size: len as u32,
                max: MAX_FRAME_SIZE,
            });
        }

        if len == 0 {
            return Ok(None);
        }

        let mut payload = vec![0u8; len];
        match self.reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ProtocolError::ConnectionClosed);
            }
            Err(e) => return Err(e.into()),
        }

        Ok(serde_json::from_slice(&payload).ok())
    }

    /// Returns a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Unwraps this FrameReader, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Writes framed commands to a byte stream.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: Write> FrameWriter<W> {
    /// Creates a new FrameWriter wrapping the given writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a single framed command.
    pub fn write_command(&mut self, command: &Command) -> ProtocolResult<()> {
        let data = encode_command(command)?;
        self.writer.write_all(&data)?;
        Ok(())
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> ProtocolResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Returns a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Unwraps this FrameWriter, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
