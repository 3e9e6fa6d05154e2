//! Per-connection authentication and message dispatch.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use natter_protocol::{Command, ProtocolError};

use crate::auth::CredentialDirectory;
use crate::error::{ServerError, ServerResult};
use crate::registry::{SessionHandle, SessionRegistry};
use crate::socket::{Connection, read_command, write_command};

/// Handles one accepted connection to completion.
///
/// The handler is a three-state machine run on its own task:
/// unauthenticated (only a valid `Auth` drives a transition),
/// authenticated (message dispatch), closed (unregister exactly once,
/// drop the connection). Routing decisions are delegated to the
/// [`SessionRegistry`]; credential checks to the [`CredentialDirectory`].
pub struct ClientHandler {
    directory: Arc<dyn CredentialDirectory>,
    registry: Arc<SessionRegistry>,
    /// Display username once authenticated.
    username: Option<String>,
}

impl ClientHandler {
    /// Creates a handler for one connection.
    pub fn new(directory: Arc<dyn CredentialDirectory>, registry: Arc<SessionRegistry>) -> Self {
        Self {
            directory,
            registry,
            username: None,
        }
    }

    /// Runs the connection to completion and releases its resources.
    ///
    /// Outbound traffic (both this handler's replies and registry
    /// deliveries) goes through one channel drained by a writer task, so
    /// frames from concurrent senders never interleave.
    pub async fn run(mut self, connection: Connection) {
        let peer = connection.peer_addr();
        let Connection {
            stream,
            permit: _permit,
            ..
        } = connection;
        let (mut reader, mut writer) = stream.into_split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Command>();

        let writer_task = tokio::spawn(async move {
            while let Some(command) = outbound_rx.recv().await {
                if let Err(e) = write_command(&mut writer, &command).await {
                    debug!(error = %e, "outbound write failed");
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        let result = self.serve(&mut reader, &outbound).await;
        match &result {
            Ok(()) => debug!(peer = %peer, "connection ended"),
            Err(e) if e.is_disconnect() => debug!(peer = %peer, "peer disconnected"),
            Err(e) => warn!(peer = %peer, error = %e, "connection failed"),
        }

        // Closed: entered exactly once, on every path out of serve().
        if let Some(username) = self.username.take() {
            self.registry.unregister(&username).await;
            info!(username = %username, "session closed");
        }
        drop(outbound);
        let _ = writer_task.await;
    }

    async fn serve(
        &mut self,
        reader: &mut OwnedReadHalf,
        outbound: &mpsc::UnboundedSender<Command>,
    ) -> ServerResult<()> {
        let username = self.authenticate(reader, outbound).await?;
        self.read_messages(reader, outbound, username).await
    }

    /// Unauthenticated state: loops until a valid `Auth` binds the
    /// session. Absent commands and every other kind are ignored.
    async fn authenticate(
        &mut self,
        reader: &mut OwnedReadHalf,
        outbound: &mpsc::UnboundedSender<Command>,
    ) -> ServerResult<String> {
        loop {
            let Some(command) = read_command(reader).await? else {
                continue;
            };
            let (login, password) = match command {
                Command::Auth { login, password } => (login, password),
                other => {
                    debug!(kind = other.kind(), "ignoring command before authentication");
                    continue;
                }
            };

            let Some(username) = self.directory.resolve_user(&login, &password) else {
                debug!(login = %login, "authentication rejected");
                self.reply(outbound, Command::error("invalid credentials"))?;
                continue;
            };

            // Claiming the name in the registry is the atomic step; the
            // reply only goes out once the binding exists.
            let handle = SessionHandle::new(outbound.clone());
            if !self.registry.register(&username, handle).await {
                debug!(username = %username, "username already connected");
                self.reply(outbound, Command::error("username already connected"))?;
                continue;
            }

            self.username = Some(username.clone());
            self.reply(outbound, Command::auth_ok(&username))?;
            info!(username = %username, "session authenticated");
            return Ok(username);
        }
    }

    /// Authenticated state: dispatches commands until `End` or a read
    /// failure. Absent commands are ignored.
    async fn read_messages(
        &mut self,
        reader: &mut OwnedReadHalf,
        outbound: &mpsc::UnboundedSender<Command>,
        mut username: String,
    ) -> ServerResult<()> {
        loop {
            let Some(command) = read_command(reader).await? else {
                continue;
            };
            match command {
                Command::PublicMessage { text } => {
                    self.registry.broadcast(&username, &text).await;
                }
                Command::PrivateMessage { recipient, text } => {
                    self.registry.send_private(&username, &recipient, &text).await;
                }
                Command::UpdateUsername {
                    username: requested,
                } => {
                    if !self.directory.update_username(&username, &requested) {
                        self.reply(
                            outbound,
                            Command::error(format!("cannot rename to '{requested}'")),
                        )?;
                    } else if !self.registry.rename(&username, &requested).await {
                        self.directory.update_username(&requested, &username);
                        self.reply(
                            outbound,
                            Command::error(format!("cannot rename to '{requested}'")),
                        )?;
                    } else {
                        info!(old = %username, new = %requested, "username changed");
                        username = requested;
                        self.username = Some(username.clone());
                        self.registry.notify_roster_changed().await;
                    }
                }
                Command::End => {
                    debug!(username = %username, "end received");
                    return Ok(());
                }
                other => {
                    debug!(kind = other.kind(), "ignoring unexpected command");
                }
            }
        }
    }

    fn reply(&self, outbound: &mpsc::UnboundedSender<Command>, command: Command) -> ServerResult<()> {
        outbound
            .send(command)
            .map_err(|_| ServerError::Protocol(ProtocolError::ConnectionClosed))
    }
}
