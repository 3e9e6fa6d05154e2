//! Live-session roster and message routing.
//!
//! The registry is the synchronization point between connection handlers:
//! it enforces that a display username is bound to at most one live
//! connection and performs the fan-out of broadcast and private messages.
//! Handlers delegate here; delivery ordering across connections is
//! whatever the roster lock hands out.

use std::collections::HashMap;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;

use natter_protocol::Command;

/// Handle through which the registry delivers commands to one session.
///
/// Wraps the connection's outbound channel; the owning handler's writer
/// task drains it into the socket. Delivery to a session whose writer is
/// gone is dropped silently; that handler is already shutting down.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    outbound: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    /// Creates a handle from a connection's outbound channel.
    pub fn new(outbound: mpsc::UnboundedSender<Command>) -> Self {
        Self { outbound }
    }

    fn deliver(&self, command: Command) {
        let _ = self.outbound.send(command);
    }
}

/// Tracks which usernames are currently connected and routes messages.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a session is currently bound to `username`.
    pub async fn is_username_live(&self, username: &str) -> bool {
        self.sessions.read().await.contains_key(username)
    }

    /// Binds `username` to the given session handle.
    ///
    /// Returns false without registering when the username is already
    /// live; the check and the insert are one atomic step.
    pub async fn register(&self, username: &str, handle: SessionHandle) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(username) {
            return false;
        }
        sessions.insert(username.to_string(), handle);
        debug!(username = %username, live = sessions.len(), "session registered");
        true
    }

    /// Removes the session bound to `username`. Idempotent.
    pub async fn unregister(&self, username: &str) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(username).is_some() {
            debug!(username = %username, live = sessions.len(), "session unregistered");
        }
    }

    /// Atomically rebinds a live session from `old` to `new`.
    ///
    /// Returns false when `new` is already live or `old` is not.
    pub async fn rename(&self, old: &str, new: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(new) {
            return false;
        }
        match sessions.remove(old) {
            Some(handle) => {
                sessions.insert(new.to_string(), handle);
                debug!(old = %old, new = %new, "session renamed");
                true
            }
            None => false,
        }
    }

    /// Delivers `text` from `sender` to every live session except the
    /// sender's own.
    pub async fn broadcast(&self, sender: &str, text: &str) {
        let sessions = self.sessions.read().await;
        let delivery = Command::public_message(format!("{sender}: {text}"));
        for (username, handle) in sessions.iter() {
            if username != sender {
                handle.deliver(delivery.clone());
            }
        }
        debug!(sender = %sender, recipients = sessions.len().saturating_sub(1), "broadcast delivered");
    }

    /// Delivers `text` from `sender` to `recipient` if the recipient is
    /// live; otherwise reports the failure back to the sender as an
    /// `Error` command.
    pub async fn send_private(&self, sender: &str, recipient: &str, text: &str) {
        let sessions = self.sessions.read().await;
        match sessions.get(recipient) {
            Some(handle) => {
                handle.deliver(Command::private_message(
                    recipient,
                    format!("{sender}: {text}"),
                ));
                debug!(sender = %sender, recipient = %recipient, "private message delivered");
            }
            None => {
                debug!(sender = %sender, recipient = %recipient, "private recipient not live");
                if let Some(sender_handle) = sessions.get(sender) {
                    sender_handle.deliver(Command::error(format!(
                        "user '{recipient}' is not connected"
                    )));
                }
            }
        }
    }

    /// Announces the current roster to every live session.
    pub async fn notify_roster_changed(&self) {
        let sessions = self.sessions.read().await;
        let mut usernames: Vec<&str> = sessions.keys().map(String::as_str).collect();
        usernames.sort_unstable();
        let notice = Command::public_message(format!("connected users: {}", usernames.join(", ")));
        for handle in sessions.values() {
            handle.deliver(notice.clone());
        }
    }

    /// Returns the currently live usernames, sorted.
    pub async fn live_usernames(&self) -> Vec<String> {
        let sessions = self.sessions.read().await;
        let mut usernames: Vec<String> = sessions.keys().cloned().collect();
        usernames.sort_unstable();
        usernames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (SessionHandle, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionHandle::new(tx), rx)
    }

    #[tokio::test]
    async fn register_rejects_live_username() {
        let registry = SessionRegistry::new();
        let (alice, _alice_rx) = session();
        let (imposter, _imposter_rx) = session();

        assert!(registry.register("alice", alice).await);
        assert!(registry.is_username_live("alice").await);
        assert!(!registry.register("alice", imposter).await);

        // The original binding is unaffected.
        assert_eq!(registry.live_usernames().await, vec!["alice"]);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = SessionRegistry::new();
        let (alice, _rx) = session();
        registry.register("alice", alice).await;

        registry.unregister("alice").await;
        registry.unregister("alice").await;
        assert!(!registry.is_username_live("alice").await);
    }

    #[tokio::test]
    async fn broadcast_skips_sender() {
        let registry = SessionRegistry::new();
        let (alice, mut alice_rx) = session();
        let (bob, mut bob_rx) = session();
        registry.register("alice", alice).await;
        registry.register("bob", bob).await;

        registry.broadcast("alice", "hi").await;

        assert_eq!(
            bob_rx.recv().await,
            Some(Command::public_message("alice: hi"))
        );
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn private_message_reaches_only_recipient() {
        let registry = SessionRegistry::new();
        let (alice, mut alice_rx) = session();
        let (bob, mut bob_rx) = session();
        let (carol, mut carol_rx) = session();
        registry.register("alice", alice).await;
        registry.register("bob", bob).await;
        registry.register("carol", carol).await;

        registry.send_private("alice", "bob", "psst").await;

        assert_eq!(
            bob_rx.recv().await,
            Some(Command::private_message("bob", "alice: psst"))
        );
        assert!(alice_rx.try_recv().is_err());
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn private_message_to_missing_recipient_errors_sender() {
        let registry = SessionRegistry::new();
        let (alice, mut alice_rx) = session();
        registry.register("alice", alice).await;

        registry.send_private("alice", "ghost", "anyone?").await;

        match alice_rx.recv().await {
            Some(Command::Error { message }) => assert!(message.contains("ghost")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rename_rebinds_and_rejects_collisions() {
        let registry = SessionRegistry::new();
        let (alice, _alice_rx) = session();
        let (bob, _bob_rx) = session();
        registry.register("alice", alice).await;
        registry.register("bob", bob).await;

        assert!(!registry.rename("alice", "bob").await);
        assert!(registry.rename("alice", "alicia").await);
        assert!(!registry.is_username_live("alice").await);
        assert!(registry.is_username_live("alicia").await);
        assert!(!registry.rename("alice", "anything").await);
    }

    #[tokio::test]
    async fn roster_notice_reaches_everyone() {
        let registry = SessionRegistry::new();
        let (alice, mut alice_rx) = session();
        let (bob, mut bob_rx) = session();
        registry.register("alice", alice).await;
        registry.register("bob", bob).await;

        registry.notify_roster_changed().await;

        let expected = Command::public_message("connected users: alice, bob");
        assert_eq!(alice_rx.recv().await, Some(expected.clone()));
        assert_eq!(bob_rx.recv().await, Some(expected));
    }

    #[tokio::test]
    async fn delivery_to_dead_session_is_dropped() {
        let registry = SessionRegistry::new();
        let (alice, alice_rx) = session();
        let (bob, mut bob_rx) = session();
        registry.register("alice", alice).await;
        registry.register("bob", bob).await;
        drop(alice_rx);

        // Must not fault even though alice's writer is gone.
        registry.broadcast("bob", "still here").await;
        registry.notify_roster_changed().await;
        assert_eq!(
            bob_rx.recv().await,
            Some(Command::public_message("connected users: alice, bob"))
        );
    }
}
