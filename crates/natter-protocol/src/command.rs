//! The command set exchanged between client and server.

use serde::{Deserialize, Serialize};

/// One typed message exchanged over a chat connection.
///
/// The set of kinds is closed: both peers compile against this enum and no
/// kind can be introduced at runtime. Each variant carries exactly the
/// payload needed to interpret it, so a kind/payload mismatch is
/// unrepresentable outside the codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Credential presentation, client to server.
    Auth {
        /// Account login.
        login: String,
        /// Account password.
        password: String,
    },

    /// Successful authentication, server to client.
    AuthOk {
        /// The display username the session was bound to.
        username: String,
    },

    /// Human-readable failure the receiving peer should surface.
    Error {
        /// What went wrong.
        message: String,
    },

    /// Broadcast text. Sent by a client to post, by the server to deliver.
    PublicMessage {
        /// Message body.
        text: String,
    },

    /// Direct text for a single recipient.
    PrivateMessage {
        /// Display username of the recipient.
        recipient: String,
        /// Message body.
        text: String,
    },

    /// Request to rebind the session to a new display username.
    UpdateUsername {
        /// The requested username.
        username: String,
    },

    /// Orderly termination of the connection.
    End,
}

impl Command {
    /// Creates an Auth command.
    pub fn auth(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Auth {
            login: login.into(),
            password: password.into(),
        }
    }

    /// Creates an AuthOk command.
    pub fn auth_ok(username: impl Into<String>) -> Self {
        Self::AuthOk {
            username: username.into(),
        }
    }

    /// Creates an Error command.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Creates a PublicMessage command.
    pub fn public_message(text: impl Into<String>) -> Self {
        Self::PublicMessage { text: text.into() }
    }

    /// Creates a PrivateMessage command.
    pub fn private_message(recipient: impl Into<String>, text: impl Into<String>) -> Self {
        Self::PrivateMessage {
            recipient: recipient.into(),
            text: text.into(),
        }
    }

    /// Creates an UpdateUsername command.
    pub fn update_username(username: impl Into<String>) -> Self {
        Self::UpdateUsername {
            username: username.into(),
        }
    }

    /// Returns the kind name as it appears on the wire, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::AuthOk { .. } => "auth_ok",
            Self::Error { .. } => "error",
            Self::PublicMessage { .. } => "public_message",
            Self::PrivateMessage { .. } => "private_message",
            Self::UpdateUsername { .. } => "update_username",
            Self::End => "end",
        }
    }
}
