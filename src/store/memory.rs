//! In-memory store backend, a map living as long as the owning store.

use std::collections::HashMap;

use crate::store::entry::AuthEntry;

/// Map-backed entries keyed by `server=user`. Iteration order is
/// unspecified, unlike the file backend's stable line order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, AuthEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact match when a user name is given, first entry on the server
    /// otherwise. Expects an already-canonical server address.
    pub fn get(&self, server_address: &str, user_name: Option<&str>) -> Option<&AuthEntry> {
        match user_name {
            Some(user) => self.entries.get(&format!("{server_address}={user}")),
            None => self
                .entries
                .values()
                .find(|entry| entry.matches(server_address, None)),
        }
    }

    pub fn list(&self) -> Vec<AuthEntry> {
        self.entries.values().cloned().collect()
    }

    /// Inserts or replaces the (server, user) entry; `None` removes it.
    pub fn save(&mut self, server_address: &str, user_name: &str, value: Option<&str>) {
        let key = format!("{server_address}={user_name}");
        match value {
            Some(value) => {
                self.entries.insert(
                    key,
                    AuthEntry {
                        server_address: server_address.to_string(),
                        user_name: user_name.to_string(),
                        value: value.to_string(),
                    },
                );
            }
            None => {
                self.entries.remove(&key);
            }
        }
    }
}
