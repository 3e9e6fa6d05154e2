//! TCP listener and framed connection I/O.
//!
//! This module provides the async accept loop and the length-prefixed
//! command framing used on every server-side connection. The frame
//! discipline matches [`natter_protocol`]: 4-byte big-endian length,
//! JSON payload, absent (`Ok(None)`) for complete frames that do not
//! resolve into a known command.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info};

use natter_protocol::{Command, MAX_FRAME_SIZE, ProtocolError, encode_command};

use crate::auth::CredentialDirectory;
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::ClientHandler;
use crate::registry::SessionRegistry;

/// TCP server accepting chat connections.
pub struct ChatServer {
    listener: TcpListener,
    /// Semaphore for limiting concurrent connections.
    connection_semaphore: Arc<Semaphore>,
}

impl ChatServer {
    /// Binds to the address in the given configuration.
    pub async fn bind(config: ServerConfig) -> ServerResult<Self> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "chat server listening");

        let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));

        Ok(Self {
            listener,
            connection_semaphore,
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts a single connection, waiting for a free connection slot
    /// first. The slot is released when the connection is dropped.
    pub async fn accept(&self) -> ServerResult<Connection> {
        let permit = self.connection_semaphore.clone().acquire_owned().await;
        let permit = permit.expect("semaphore should not be closed");

        let (stream, peer_addr) = self.listener.accept().await?;
        debug!(peer = %peer_addr, "accepted new connection");

        Ok(Connection {
            stream,
            peer_addr,
            permit,
        })
    }

    /// Runs the accept loop, spawning one handler task per connection.
    ///
    /// Runs indefinitely; accept errors are logged and the loop continues.
    pub async fn run(
        &self,
        directory: Arc<dyn CredentialDirectory>,
        registry: Arc<SessionRegistry>,
    ) -> ServerResult<()> {
        loop {
            match self.accept().await {
                Ok(connection) => {
                    let handler = ClientHandler::new(directory.clone(), registry.clone());
                    tokio::spawn(handler.run(connection));
                }
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                }
            }
        }
    }

    /// Runs the accept loop until the shutdown future completes.
    pub async fn run_until_shutdown<S>(
        &self,
        directory: Arc<dyn CredentialDirectory>,
        registry: Arc<SessionRegistry>,
        shutdown: S,
    ) -> ServerResult<()>
    where
        S: std::future::Future<Output = ()> + Send,
    {
        tokio::select! {
            result = self.run(directory, registry) => result,
            _ = shutdown => {
                info!("shutdown signal received");
                Ok(())
            }
        }
    }
}

/// One accepted client connection.
pub struct Connection {
    pub(crate) stream: TcpStream,
    pub(crate) peer_addr: SocketAddr,
    pub(crate) permit: OwnedSemaphorePermit,
}

impl Connection {
    /// Returns the peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

/// Reads a single framed command from the stream.
///
/// Returns `Ok(None)` (absent) for a complete frame that did not
/// deserialize into a known command. A closed stream, mid-frame EOF, or
/// an oversized declared length is terminal.
pub(crate) async fn read_command<R>(reader: &mut R) -> ServerResult<Option<Command>>
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
pub(crate) async fn write_command<W>(writer: &mut W, command: &Command) -> ServerResult<()>
where
    W: AsyncWrite + Unpin,
{
    let data = encode_command(command)?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;

    async fn stream_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn bind_assigns_ephemeral_port() {
        let server = ChatServer::bind(ServerConfig::new("127.0.0.1:0")).await.unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn accepted_connection_reports_peer() {
        let server = ChatServer::bind(ServerConfig::new("127.0.0.1:0")).await.unwrap();
        let addr = server.local_addr().unwrap();

        let client = TcpStream::connect(addr).await.unwrap();
        let connection = server.accept().await.unwrap();
        assert_eq!(connection.peer_addr(), client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn command_roundtrip_over_tcp() {
        let (mut client, mut server) = stream_pair().await;

        write_command(&mut client, &Command::auth("alice", "secret"))
            .await
            .unwrap();
        let received = read_command(&mut server).await.unwrap();
        assert_eq!(received, Some(Command::auth("alice", "secret")));

        write_command(&mut server, &Command::auth_ok("alice"))
            .await
            .unwrap();
        let received = read_command(&mut client).await.unwrap();
        assert_eq!(received, Some(Command::auth_ok("alice")));
    }

    #[tokio::test]
    async fn unknown_frame_is_absent_over_tcp() {
        let (mut client, mut server) = stream_pair().await;

        let unknown = br#"{"type":"typing_indicator"}"#;
        client
            .write_all(&(unknown.len() as u32).to_be_bytes())
            .await
            .unwrap();
        client.write_all(unknown).await.unwrap();
        write_command(&mut client, &Command::End).await.unwrap();

        assert_eq!(read_command(&mut server).await.unwrap(), None);
        assert_eq!(read_command(&mut server).await.unwrap(), Some(Command::End));
    }

    #[tokio::test]
    async fn peer_disconnect_is_terminal() {
        let (client, mut server) = stream_pair().await;
        drop(client);

        let result = read_command(&mut server).await;
        assert!(matches!(
            result,
            Err(ServerError::Protocol(ProtocolError::ConnectionClosed))
        ));
    }

    #[tokio::test]
    async fn oversized_length_is_terminal() {
        let (mut client, mut server) = stream_pair().await;
        client
            .write_all(&(MAX_FRAME_SIZE + 1).to_be_bytes())
            .await
            .unwrap();

        let result = read_command(&mut server).await;
        assert!(matches!(
            result,
            Err(ServerError::Protocol(ProtocolError::FrameTooLarge { .. }))
        ));
    }
}
