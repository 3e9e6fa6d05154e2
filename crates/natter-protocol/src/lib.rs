//! Wire protocol shared by the natter client and server.
//!
//! Every message exchanged over a chat connection is one [`Command`],
//! framed as length-prefixed JSON:
//! - 4 bytes: payload length (u32, big-endian)
//! - N bytes: JSON payload
//!
//! A complete frame whose payload does not resolve into a known command
//! decodes as *absent* (`Ok(None)`): the reader consumed the frame and the
//! caller keeps reading. Only I/O failures and a closed stream terminate a
//! connection.
//!
//! # Example
//!
//! ```rust
//! use std::io::Cursor;
//! use natter_protocol::{Command, FrameReader, encode_command};
//!
//! let bytes = encode_command(&Command::public_message("hello")).unwrap();
//! let mut reader = FrameReader::new(Cursor::new(bytes));
//! let command = reader.read_command().unwrap();
//! assert_eq!(command, Some(Command::public_message("hello")));
//! ```

mod command;
mod error;
mod framing;

pub use command::Command;
pub use error::{ProtocolError, ProtocolResult};
pub use framing::{FrameReader, FrameWriter, encode_command};

/// Maximum size of a single frame payload (64 KiB).
pub const MAX_FRAME_SIZE: u32 = 64 * 1024;
