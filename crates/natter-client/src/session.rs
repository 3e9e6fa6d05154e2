//! The client session: connection ownership, send operations, and the
//! background receive loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use natter_protocol::Command;

use crate::connection::{read_command, write_command};
use crate::error::{ClientError, ClientResult};
use crate::listener::{CommandListener, ListenerId, ListenerSet};

struct SessionInner {
    writer: Mutex<OwnedWriteHalf>,
    connected: AtomicBool,
    closed: CancellationToken,
    listeners: ListenerSet,
}

/// A connection to a natter server.
///
/// Send operations encode and write on the caller's task; a write failure
/// is reported to the caller and does not by itself close the connection.
/// The background receive loop is the sole authority that flips the
/// session to disconnected on a network failure.
pub struct ClientSession {
    inner: Arc<SessionInner>,
    receive_task: JoinHandle<()>,
}

impl ClientSession {
    /// Connects to the server and starts the receive loop.
    ///
    /// On failure no session exists: nothing was spawned and nothing has
    /// to be cleaned up.
    pub async fn connect(host: &str, port: u16) -> ClientResult<Self> {
        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            ClientError::Connection(format!("failed to connect to {host}:{port}: {e}"))
        })?;
        debug!(host = %host, port = port, "connected");

        let (reader, writer) = stream.into_split();
        let inner = Arc::new(SessionInner {
            writer: Mutex::new(writer),
            connected: AtomicBool::new(true),
            closed: CancellationToken::new(),
            listeners: ListenerSet::new(),
        });
        let receive_task = tokio::spawn(receive_loop(inner.clone(), reader));

        Ok(Self {
            inner,
            receive_task,
        })
    }

    /// Sends credentials for authentication.
    pub async fn send_auth(&self, login: &str, password: &str) -> ClientResult<()> {
        self.send_command(Command::auth(login, password)).await
    }

    /// Posts a broadcast message.
    pub async fn send_public_message(&self, text: &str) -> ClientResult<()> {
        self.send_command(Command::public_message(text)).await
    }

    /// Sends a direct message to one recipient.
    pub async fn send_private_message(&self, recipient: &str, text: &str) -> ClientResult<()> {
        self.send_command(Command::private_message(recipient, text))
            .await
    }

    /// Requests a username change.
    pub async fn send_username_change(&self, username: &str) -> ClientResult<()> {
        self.send_command(Command::update_username(username)).await
    }

    /// Registers a listener invoked with every received command.
    pub fn add_listener(&self, listener: Arc<dyn CommandListener>) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    /// Removes a listener registration. Returns false if it was already
    /// gone.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Returns true while the session holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Closes the session: sends `End` best-effort, stops the receive
    /// loop before its next decode attempt, and shuts the transport down.
    ///
    /// Idempotent and safe to call from any task.
    pub async fn close(&self) {
        if self.inner.connected.swap(false, Ordering::SeqCst) {
            let mut writer = self.inner.writer.lock().await;
            let _ = write_command(&mut *writer, &Command::End).await;
            let _ = writer.shutdown().await;
        }
        self.inner.closed.cancel();
    }

    /// Completes when the session has closed, locally or because the
    /// server went away.
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await;
    }

    async fn send_command(&self, command: Command) -> ClientResult<()> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let mut writer = self.inner.writer.lock().await;
        write_command(&mut *writer, &command).await
    }
}

/// Receives commands until cancelled or the transport fails, handing each
/// one to the registered listeners.
async fn receive_loop(inner: Arc<SessionInner>, mut reader: OwnedReadHalf) {
    loop {
        let result = tokio::select! {
            biased;
            _ = inner.closed.cancelled() => {
                debug!("receive loop cancelled");
                return;
            }
            result = read_command(&mut reader) => result,
        };
        match result {
            Ok(Some(command)) => {
                debug!(kind = command.kind(), "command received");
                inner.listeners.dispatch(&command);
            }
            Ok(None) => continue,
            Err(e) => {
                if e.is_disconnect() {
                    debug!("server closed the connection");
                } else {
                    debug!(error = %e, "read failed");
                }
                inner.connected.store(false, Ordering::SeqCst);
                let mut writer = inner.writer.lock().await;
                let _ = writer.shutdown().await;
                drop(writer);
                inner.closed.cancel();
                return;
            }
        }
    }
}
