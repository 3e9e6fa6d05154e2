//! Console input parsing and received-command rendering.
//!
//! The console is a thin presentation layer over [`ClientSession`]: it
//! turns input lines into send operations and received commands into
//! printable lines. Everything protocol-shaped stays in the session.
//!
//! [`ClientSession`]: crate::ClientSession

use natter_protocol::Command;

/// What an input line asks the session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Post a broadcast message.
    Public(String),
    /// Send a direct message.
    Private { recipient: String, text: String },
    /// Request a username change.
    Rename(String),
    /// Close the session and exit.
    Quit,
    /// Nothing to do (blank line).
    Empty,
    /// Unusable input, with a usage hint.
    Invalid(&'static str),
}

/// Parses one line of console input.
///
/// Lines starting with `/` are commands (`/msg <user> <text>`,
/// `/name <username>`, `/quit`); anything else is a public message.
pub fn parse_line(line: &str) -> InputAction {
    let line = line.trim();
    if line.is_empty() {
        return InputAction::Empty;
    }
    if !line.starts_with('/') {
        return InputAction::Public(line.to_string());
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    match command {
        "/msg" => match rest.split_once(char::is_whitespace) {
            Some((recipient, text)) if !text.trim().is_empty() => InputAction::Private {
                recipient: recipient.to_string(),
                text: text.trim().to_string(),
            },
            _ => InputAction::Invalid("usage: /msg <user> <text>"),
        },
        "/name" => {
            if rest.is_empty() || rest.contains(char::is_whitespace) {
                InputAction::Invalid("usage: /name <username>")
            } else {
                InputAction::Rename(rest.to_string())
            }
        }
        "/quit" => InputAction::Quit,
        _ => InputAction::Invalid("commands: /msg <user> <text>, /name <username>, /quit"),
    }
}

/// Renders a received command as a printable line.
///
/// Returns `None` for kinds that carry nothing to show (client-to-server
/// kinds echoed by a confused peer are simply dropped).
pub fn render(command: &Command) -> Option<String> {
    match command {
        Command::AuthOk { username } => Some(format!("logged in as {username}")),
        Command::Error { message } => Some(format!("error: {message}")),
        Command::PublicMessage { text } => Some(text.clone()),
        Command::PrivateMessage { text, .. } => Some(format!("[private] {text}")),
        Command::Auth { .. } | Command::UpdateUsername { .. } | Command::End => None,
    }
}
