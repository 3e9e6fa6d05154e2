//! Chat client: session, listener fan-out, console front-end.
//!
//! [`ClientSession`] owns the connection to a natter server: it sends
//! commands on the caller's task and runs one background receive loop
//! that hands every decoded command to the registered
//! [`CommandListener`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use natter_client::ClientSession;
//! use natter_protocol::Command;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = ClientSession::connect("127.0.0.1", 8189).await?;
//!     session.add_listener(Arc::new(|command: &Command| {
//!         println!("received: {}", command.kind());
//!     }));
//!     session.send_auth("login1", "pass1").await?;
//!     session.send_public_message("hello").await?;
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod console;
mod connection;
mod error;
mod listener;
mod session;

pub use error::{ClientError, ClientResult};
pub use listener::{CommandListener, ListenerId};
pub use session::ClientSession;
