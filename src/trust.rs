//! Trust fingerprint store.
//!
//! SSL server identities are pinned by caching a certificate fingerprint
//! per server, the same scheme `p4 trust` uses (`~/.p4trust`, or
//! `P4TRUST`). Fingerprints are stored as ordinary entries under two
//! reserved user names: the primary fingerprint under `**++**` and a
//! pending replacement, recorded ahead of a certificate rollover, under
//! `++++++`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AuthConfig;
use crate::error::AuthResult;
use crate::store::{AuthEntry, AuthStore, StoreOptions};

/// Reserved user name for a server's primary fingerprint.
pub const FINGERPRINT_USER: &str = "**++**";
/// Reserved user name for a pending replacement fingerprint.
pub const REPLACEMENT_FINGERPRINT_USER: &str = "++++++";

/// One pinned server identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub server_address: String,
    /// Reserved mask user, or an explicit user for hosts that pin per user.
    pub user_name: String,
    pub fingerprint: String,
}

impl From<AuthEntry> for Fingerprint {
    fn from(entry: AuthEntry) -> Self {
        Self {
            server_address: entry.server_address,
            user_name: entry.user_name,
            fingerprint: entry.value,
        }
    }
}

/// Fingerprint store over a file or an in-memory map.
#[derive(Debug)]
pub struct TrustStore {
    store: AuthStore,
}

impl TrustStore {
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

    /// Process-local store that never touches the user's trust file.
    pub fn in_memory() -> Self {
        Self {
            store: AuthStore::in_memory(),
        }
    }

    /// Store at the location the configuration resolves to.
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        Ok(Self::with_options(
            config.trust_file()?,
            config.store_options(),
        ))
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.store.path()
    }

    /// Fingerprint stored for (server, user). Most callers want the mask
    /// helpers below instead.
    pub fn get(&self, server_address: &str, user_name: &str) -> AuthResult<Option<Fingerprint>> {
        Ok(self
            .store
            .lookup(server_address, Some(user_name))?
            .map(Fingerprint::from))
    }

    pub fn list(&self) -> AuthResult<Vec<Fingerprint>> {
        Ok(self
            .store
            .list_all()?
            .into_iter()
            .map(Fingerprint::from)
            .collect())
    }

    pub fn save(&self, server_address: &str, user_name: &str, fingerprint: &str) -> AuthResult<()> {
        self.store.upsert(server_address, user_name, Some(fingerprint))
    }

    pub fn remove(&self, server_address: &str, user_name: &str) -> AuthResult<()> {
        self.store.upsert(server_address, user_name, None)
    }

    /// Pins the server's primary fingerprint.
    pub fn install(&self, server_address: &str, fingerprint: &str) -> AuthResult<()> {
        info!(server = %server_address, "installing server fingerprint");
        self.save(server_address, FINGERPRINT_USER, fingerprint)
    }

    /// Records a replacement fingerprint ahead of a certificate rollover,
    /// leaving the primary in place.
    pub fn install_replacement(&self, server_address: &str, fingerprint: &str) -> AuthResult<()> {
        info!(server = %server_address, "installing replacement fingerprint");
        self.save(server_address, REPLACEMENT_FINGERPRINT_USER, fingerprint)
    }

    pub fn fingerprint(&self, server_address: &str) -> AuthResult<Option<Fingerprint>> {
        self.get(server_address, FINGERPRINT_USER)
    }

    pub fn replacement(&self, server_address: &str) -> AuthResult<Option<Fingerprint>> {
        self.get(server_address, REPLACEMENT_FINGERPRINT_USER)
    }

    /// Whether any primary fingerprint is pinned for the server.
    pub fn exists(&self, server_address: &str) -> AuthResult<bool> {
        Ok(self.fingerprint(server_address)?.is_some())
    }

    /// Whether the pinned primary fingerprint equals the presented one.
    pub fn matches(&self, server_address: &str, fingerprint: &str) -> AuthResult<bool> {
        Ok(self
            .fingerprint(server_address)?
            .map(|pinned| pinned.fingerprint == fingerprint)
            .unwrap_or(false))
    }

    pub fn remove_fingerprint(&self, server_address: &str) -> AuthResult<()> {
        self.remove(server_address, FINGERPRINT_USER)
    }

    pub fn remove_replacement(&self, server_address: &str) -> AuthResult<()> {
        self.remove(server_address, REPLACEMENT_FINGERPRINT_USER)
    }

    /// On reconnect after a certificate rollover: when the primary no
    /// longer matches the presented fingerprint but the stored replacement
    /// does, the replacement becomes the new primary and its slot is
    /// cleared. Returns whether the promotion happened.
    pub fn promote_replacement(&self, server_address: &str, presented: &str) -> AuthResult<bool> {
        if self.matches(server_address, presented)? {
            return Ok(false);
        }
        let replacement_matches = self
            .replacement(server_address)?
            .map(|pending| pending.fingerprint == presented)
            .unwrap_or(false);
        if !replacement_matches {
            return Ok(false);
        }

        info!(server = %server_address, "promoting replacement fingerprint");
        self.install(server_address, presented)?;
        self.remove_replacement(server_address)?;
        Ok(true)
    }
}
