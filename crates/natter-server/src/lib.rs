//! Chat server: accept loop, connection handlers, session registry.
//!
//! This crate provides the natter server daemon that handles:
//! - TCP accept loop with a connection cap
//! - Per-connection authentication and message dispatch
//! - Live-session roster with broadcast and private routing
//! - Login/password directory seeded from configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use natter_server::{ChatServer, MemoryDirectory, ServerConfig, SessionRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default().with_user("alice", "secret", "alice");
//!     let directory = Arc::new(MemoryDirectory::new(config.users.clone()));
//!     let registry = Arc::new(SessionRegistry::new());
//!
//!     let server = ChatServer::bind(config).await?;
//!     server.run(directory, registry).await?;
//!     Ok(())
//! }
//! ```

mod auth;
mod config;
mod error;
mod handler;
mod registry;
mod socket;

pub use auth::{CredentialDirectory, MemoryDirectory};
pub use config::{ServerConfig, UserAccount};
pub use error::{ServerError, ServerResult};
pub use handler::ClientHandler;
pub use registry::{SessionHandle, SessionRegistry};
pub use socket::{ChatServer, Connection};
