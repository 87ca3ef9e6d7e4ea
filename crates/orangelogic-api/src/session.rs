//! Session key/value store used to share the API token between client instances.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};

/// Key holding the last issued token.
pub const TOKEN_KEY: &str = "ol_token";

/// Key holding the token expiry as unix seconds.
pub const TOKEN_TIMEOUT_KEY: &str = "ol_token_timeout";

/// External key/value store scoped to one logical session.
///
/// The embedding application creates the store and decides its lifetime;
/// the client only reads and writes entries. Implementations must be safe to
/// share between client instances, but token renewals through a shared store
/// are not serialized: the last writer wins.
#[allow(clippy::module_name_repetitions)]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Reads an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes an entry, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes an entry. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn expire(&self, key: &str) -> Result<()>;
}

/// In-process session store.
#[derive(Debug, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?
            .insert(String::from(key), String::from(value));
        Ok(())
    }

    fn expire(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_get_missing_key() {
        // Arrange
        let store = MemorySessionStore::new();

        // Act & Assert
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_set_overwrites_and_expire_removes() {
        // Arrange
        let store = MemorySessionStore::new();

        // Act
        store.set(TOKEN_KEY, "first").unwrap();
        store.set(TOKEN_KEY, "second").unwrap();
        let before = store.get(TOKEN_KEY).unwrap();
        store.expire(TOKEN_KEY).unwrap();
        store.expire(TOKEN_KEY).unwrap();

        // Assert
        assert_eq!(before.as_deref(), Some("second"));
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    }
}
