//! Auth ticket store.
//!
//! Tickets are server-issued session credentials, cached per
//! (server, user) so clients can reconnect without prompting for a
//! password. The backing file is the same one the `p4` command line reads
//! and writes (`~/.p4tickets`, or `P4TICKETS`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::AuthResult;
use crate::store::{AuthEntry, AuthStore, StoreOptions};

/// One cached ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTicket {
    pub server_address: String,
    pub user_name: String,
    /// The ticket itself. Withheld when the ticket is serialized.
    #[serde(skip_serializing)]
    pub ticket_value: String,
}

impl From<AuthEntry> for AuthTicket {
    fn from(entry: AuthEntry) -> Self {
        Self {
            server_address: entry.server_address,
            user_name: entry.user_name,
            ticket_value: entry.value,
        }
    }
}

/// Ticket store over a file or an in-memory map.
#[derive(Debug)]
pub struct TicketStore {
    store: AuthStore,
}

impl TicketStore {
    /// Store backed by the given tickets file.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            store: AuthStore::file(path),
        }
    }

    pub fn with_options(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            store: AuthStore::file_with_options(path, options),
        }
    }

    /// Process-local store that never touches the user's tickets file.
    pub fn in_memory() -> Self {
        Self {
            store: AuthStore::in_memory(),
        }
    }

    /// Store at the location the configuration resolves to.
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        Ok(Self::with_options(
            config.tickets_file()?,
            config.store_options(),
        ))
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.store.path()
    }

    /// The ticket for (server, user); with `user_name` omitted, the first
    /// ticket for the server.
    pub fn get(&self, server_address: &str, user_name: Option<&str>) -> AuthResult<Option<AuthTicket>> {
        Ok(self
            .store
            .lookup(server_address, user_name)?
            .map(AuthTicket::from))
    }

    /// Just the ticket value, the common case at login.
    pub fn get_value(
        &self,
        server_address: &str,
        user_name: Option<&str>,
    ) -> AuthResult<Option<String>> {
        Ok(self
            .get(server_address, user_name)?
            .map(|ticket| ticket.ticket_value))
    }

    pub fn list(&self) -> AuthResult<Vec<AuthTicket>> {
        Ok(self
            .store
            .list_all()?
            .into_iter()
            .map(AuthTicket::from)
            .collect())
    }

    /// Saves a ticket, replacing any previous one for (server, user).
    pub fn save(&self, server_address: &str, user_name: &str, ticket_value: &str) -> AuthResult<()> {
        self.store.upsert(server_address, user_name, Some(ticket_value))
    }

    /// Drops the ticket for (server, user), typically on logout.
    pub fn remove(&self, server_address: &str, user_name: &str) -> AuthResult<()> {
        self.store.upsert(server_address, user_name, None)
    }
}
