//! Framed command I/O on the client side of a connection.
//!
//! Same frame discipline as the rest of the system: 4-byte big-endian
//! length, JSON payload, absent (`Ok(None)`) for complete frames that do
//! not resolve into a known command, terminal errors for everything that
//! leaves the stream in an unknown position.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use natter_protocol::{Command, MAX_FRAME_SIZE, ProtocolError, encode_command};

use crate::error::ClientResult;

/// Reads a single framed command from the stream.
pub(crate) async fn read_command<R>(reader: &mut R) -> ClientResult<Option<Command>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed.into());
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_FRAME_SIZE as usize {
        return Err(ProtocolError::FrameTooLarge {
            size: len as u32,
            max: MAX_FRAME_SIZE,
        }
        .into());
    }

    if len == 0 {
        return Ok(None);
    }

    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed.into());
        }
        Err(e) => return Err(e.into()),
    }

    Ok(serde_json::from_slice(&payload).ok())
}

/// Writes a single framed command to the stream.
pub(crate) async fn write_command<W>(writer: &mut W, command: &Command) -> ClientResult<()>
where
    W: AsyncWrite + Unpin,
{
    let data = encode_command(command)?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}
