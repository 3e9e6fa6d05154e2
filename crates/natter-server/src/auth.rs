//! Credential directory: login/password resolution and username updates.

use std::sync::RwLock;

use tracing::debug;

use crate::config::UserAccount;

/// Maps login credentials to display usernames and applies renames.
///
/// Handlers call this concurrently from many connection tasks, so
/// implementations must be `Send + Sync` and internally synchronized.
pub trait CredentialDirectory: Send + Sync {
    /// Resolves a login/password pair to the display username, or `None`
    /// when the credentials are unknown.
    fn resolve_user(&self, login: &str, password: &str) -> Option<String>;

    /// Rebinds the account owning `old` to the username `new`.
    ///
    /// Returns false when no account owns `old` or when `new` is already
    /// taken by another account.
    fn update_username(&self, old: &str, new: &str) -> bool;
}

/// In-memory directory seeded from the server configuration.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    accounts: RwLock<Vec<UserAccount>>,
}

impl MemoryDirectory {
    /// Creates a directory holding the given accounts.
    pub fn new(accounts: impl IntoIterator<Item = UserAccount>) -> Self {
        Self {
            accounts: RwLock::new(accounts.into_iter().collect()),
        }
    }
}

impl CredentialDirectory for MemoryDirectory {
    fn resolve_user(&self, login: &str, password: &str) -> Option<String> {
        let accounts = self.accounts.read().expect("directory lock poisoned");
        accounts
            .iter()
            .find(|a| a.login == login && a.password == password)
            .map(|a| a.username.clone())
    }

    fn update_username(&self, old: &str, new: &str) -> bool {
        let mut accounts = self.accounts.write().expect("directory lock poisoned");
        if accounts.iter().any(|a| a.username == new) {
            debug!(username = %new, "rename target already taken");
            return false;
        }
        match accounts.iter_mut().find(|a| a.username == old) {
            Some(account) => {
                account.username = new.to_string();
                debug!(old = %old, new = %new, "username updated");
                true
            }
            None => false,
        }
    }
}
