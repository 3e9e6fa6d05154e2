//! Server configuration.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ServerError, ServerResult};

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8189";

/// One seeded account in the credential directory.
#[derive(Debug, Clone, Deserialize)]
pub struct UserAccount {
    /// Login presented by the client.
    pub login: String,
    /// Password presented by the client.
    pub password: String,
    /// Display username the session is bound to.
    pub username: String,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: String,

    /// Maximum concurrent connections.
    pub max_connections: usize,

    /// Accounts seeding the credential directory.
    pub users: Vec<UserAccount>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_connections: 100,
            users: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Creates a new server configuration with the given listen address.
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            ..Default::default()
        }
    }

    /// Builder: set max connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Builder: add a seeded account.
    pub fn with_user(
        mut self,
        login: impl Into<String>,
        password: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        self.users.push(UserAccount {
            login: login.into(),
            password: password.into(),
            username: username.into(),
        });
        self
    }

    /// Loads configuration from a TOML file, filling unset fields with
    /// defaults.
    ///
    /// ```toml
    /// bind_addr = "0.0.0.0:8189"
    /// max_connections = 64
    ///
    /// [[users]]
    /// login = "login1"
    /// password = "pass1"
    /// username = "alice"
    /// ```
    pub fn load_from(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&content)
            .map_err(|e| ServerError::config(format!("{}: {}", path.display(), e)))?;

        let defaults = Self::default();
        Ok(Self {
            bind_addr: file.bind_addr.unwrap_or(defaults.bind_addr),
            max_connections: file.max_connections.unwrap_or(defaults.max_connections),
            users: file.users,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    bind_addr: Option<String>,
    max_connections: Option<usize>,
    #[serde(default)]
    users: Vec<UserAccount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.max_connections, 100);
        assert!(config.users.is_empty());
    }

    #[test]
    fn custom_config() {
        let config = ServerConfig::new("0.0.0.0:9000")
            .with_max_connections(50)
            .with_user("login1", "pass1", "alice");

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.users.len(), 1);
        assert_eq!(config.users[0].username, "alice");
    }

    #[test]
    fn load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("natterd.toml");
        std::fs::write(
            &path,
            r#"
bind_addr = "0.0.0.0:8189"

[[users]]
login = "login1"
password = "pass1"
username = "alice"

[[users]]
login = "login2"
password = "pass2"
username = "bob"
"#,
        )
        .unwrap();

        let config = ServerConfig::load_from(&path).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8189");
        // Unset field falls back to the default.
        assert_eq!(config.max_connections, 100);
        assert_eq!(config.users.len(), 2);
        assert_eq!(config.users[1].login, "login2");
    }

    #[test]
    fn load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "bind_addr = [not toml").unwrap();

        let result = ServerConfig::load_from(&path);
        assert!(matches!(result, Err(ServerError::Config { .. })));
    }
}
