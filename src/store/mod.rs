//! Credential entry stores.
//!
//! A store durably associates a (server address, user name) pair with a
//! secret value. Two backends exist: a line-oriented flat file shared with
//! the `p4` command line (tickets in `~/.p4tickets`, trust fingerprints in
//! `~/.p4trust`) and a process-local in-memory map for hosts that must not
//! touch the user's files.
//!
//! All operations on one store are serialized by a coarse per-instance
//! lock. Writers to the same file from other processes are coordinated only
//! by the advisory `.lck` protocol and the atomic replacement rename; two
//! uncoordinated writers race, last rename winning outright.

pub mod entry;
mod file;
mod lock;
mod memory;

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::AuthResult;

pub use entry::{canonical_server_address, AuthEntry};

pub const DEFAULT_LOCK_TRY: u32 = 100;
pub const DEFAULT_LOCK_DELAY: Duration = Duration::from_secs(300);
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(1);

/// Tuning for file rewrites: lock acquisition and temp file placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Attempts to take the `.lck` file before giving up.
    pub lock_try: u32,
    /// Age beyond which an existing lock file is presumed abandoned.
    pub lock_delay: Duration,
    /// Sleep between lock attempts.
    pub lock_wait: Duration,
    /// Directory for replacement temp files. Defaults to the target's own
    /// directory so the final rename does not cross filesystems.
    pub temp_dir: Option<PathBuf>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock_try: DEFAULT_LOCK_TRY,
            lock_delay: DEFAULT_LOCK_DELAY,
            lock_wait: DEFAULT_LOCK_WAIT,
            temp_dir: None,
        }
    }
}

#[derive(Debug)]
enum Backend {
    File(PathBuf),
    Memory(memory::MemoryStore),
}

/// One auth or trust store over a chosen backend.
#[derive(Debug)]
pub struct AuthStore {
    backend: Mutex<Backend>,
    options: StoreOptions,
}

impl AuthStore {
    /// Store backed by a flat file, with default lock tuning.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::file_with_options(path, StoreOptions::default())
    }

    pub fn file_with_options(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            backend: Mutex::new(Backend::File(path.into())),
            options,
        }
    }

    /// Store living only in this process, for hosts that must not read or
    /// write the user's auth files.
    pub fn in_memory() -> Self {
        Self {
            backend: Mutex::new(Backend::Memory(memory::MemoryStore::new())),
            options: StoreOptions::default(),
        }
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<PathBuf> {
        match &*self.lock_backend() {
            Backend::File(path) => Some(path.clone()),
            Backend::Memory(_) => None,
        }
    }

    /// Finds the entry for (server, user). With `user_name` omitted the
    /// first entry matching the server wins: file order for files,
    /// unspecified order for the in-memory backend.
    #[instrument(skip(self))]
    pub fn lookup(
        &self,
        server_address: &str,
        user_name: Option<&str>,
    ) -> AuthResult<Option<AuthEntry>> {
        let canonical = canonical_server_address(server_address);
        match &*self.lock_backend() {
            Backend::File(path) => Ok(file::read_entries(path)?
                .into_iter()
                .find(|entry| entry.matches(&canonical, user_name))),
            Backend::Memory(store) => Ok(store.get(&canonical, user_name).cloned()),
        }
    }

    /// Every entry in the store: file order for files, unspecified order
    /// for the in-memory backend.
    pub fn list_all(&self) -> AuthResult<Vec<AuthEntry>> {
        match &*self.lock_backend() {
            Backend::File(path) => file::read_entries(path),
            Backend::Memory(store) => Ok(store.list()),
        }
    }

    /// Inserts, replaces, or removes the entry for (server, user). A blank
    /// value is the same as an absent one: both remove the entry.
    #[instrument(skip(self, value))]
    pub fn upsert(
        &self,
        server_address: &str,
        user_name: &str,
        value: Option<&str>,
    ) -> AuthResult<()> {
        let canonical = canonical_server_address(server_address);
        let value = value.filter(|v| !v.trim().is_empty());
        match &mut *self.lock_backend() {
            Backend::File(path) => {
                file::save_entry(path, &canonical, user_name, value, &self.options)
            }
            Backend::Memory(store) => {
                store.save(&canonical, user_name, value);
                Ok(())
            }
        }
    }

    fn lock_backend(&self) -> std::sync::MutexGuard<'_, Backend> {
        // A poisoned lock cannot leave the store inconsistent: file
        // rewrites are atomic and map updates are single operations.
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn file_store() -> (AuthStore, TempDir) {
        let dir = tempdir().expect("tempdir");
        let options = StoreOptions {
            lock_try: 3,
            lock_wait: Duration::from_millis(1),
            ..StoreOptions::default()
        };
        let store = AuthStore::file_with_options(dir.path().join("tickets"), options);
        (store, dir)
    }

    #[test]
    fn upsert_then_lookup_returns_the_value() {
        let (store, _dir) = file_store();
        store
            .upsert("perforce:1666", "bob", Some("ticketA"))
            .expect("upsert");

        let entry = store
            .lookup("perforce:1666", Some("bob"))
            .expect("lookup")
            .expect("entry");
        assert_eq!(entry.value, "ticketA");
    }

    #[test]
    fn upsert_none_removes_the_entry() {
        let (store, _dir) = file_store();
        store
            .upsert("perforce:1666", "bob", Some("ticketA"))
            .expect("upsert");
        store.upsert("perforce:1666", "bob", None).expect("remove");

        assert!(store
            .lookup("perforce:1666", Some("bob"))
            .expect("lookup")
            .is_none());
    }

    #[test]
    fn blank_value_removes_like_none() {
        let (store, _dir) = file_store();
        store
            .upsert("perforce:1666", "bob", Some("ticketA"))
            .expect("upsert");
        store
            .upsert("perforce:1666", "bob", Some("  "))
            .expect("blank upsert");

        assert!(store
            .lookup("perforce:1666", Some("bob"))
            .expect("lookup")
            .is_none());
    }

    #[test]
    fn repeated_upsert_is_idempotent() {
        let (store, _dir) = file_store();
        store
            .upsert("perforce:1666", "bob", Some("ticketA"))
            .expect("first");
        store
            .upsert("perforce:1666", "bob", Some("ticketA"))
            .expect("second");

        let entries = store.list_all().expect("list");
        assert_eq!(entries.len(), 1);

        let path = store.path().expect("file store");
        assert_eq!(
            fs::read_to_string(path).expect("read"),
            "perforce:1666=bob:ticketA\n"
        );
    }

    #[test]
    fn portless_address_finds_the_canonical_entry() {
        let (store, _dir) = file_store();
        store
            .upsert("localhost:1666", "alice", Some("T1"))
            .expect("upsert");

        let entry = store
            .lookup("1666", Some("alice"))
            .expect("lookup")
            .expect("entry");
        assert_eq!(entry.server_address, "localhost:1666");
        assert_eq!(entry.value, "T1");

        // And the rewrite itself stores the canonical form.
        store.upsert("1667", "alice", Some("T2")).expect("upsert");
        let entry = store
            .lookup("localhost:1667", Some("alice"))
            .expect("lookup")
            .expect("entry");
        assert_eq!(entry.value, "T2");
    }

    #[test]
    fn omitted_user_returns_the_first_match_in_file_order() {
        let (store, _dir) = file_store();
        store
            .upsert("perforce:1666", "alice", Some("A"))
            .expect("upsert");
        store
            .upsert("perforce:1666", "bob", Some("B"))
            .expect("upsert");

        let entry = store
            .lookup("perforce:1666", None)
            .expect("lookup")
            .expect("entry");
        assert_eq!(entry.user_name, "alice");
    }

    #[test]
    fn list_all_preserves_file_order() {
        let (store, _dir) = file_store();
        store.upsert("one:1666", "u", Some("1")).expect("upsert");
        store.upsert("two:1666", "u", Some("2")).expect("upsert");
        store.upsert("three:1666", "u", Some("3")).expect("upsert");

        let servers: Vec<String> = store
            .list_all()
            .expect("list")
            .into_iter()
            .map(|entry| entry.server_address)
            .collect();
        assert_eq!(servers, ["one:1666", "two:1666", "three:1666"]);
    }

    #[test]
    fn memory_store_supports_the_same_operations() {
        let store = AuthStore::in_memory();
        store
            .upsert("perforce:1666", "bob", Some("ticketA"))
            .expect("upsert");

        assert!(store.path().is_none());
        let entry = store
            .lookup("1666", Some("bob"))
            .expect("lookup");
        // Different server entirely; canonicalization must not conflate.
        assert!(entry.is_none());

        let entry = store
            .lookup("perforce:1666", Some("bob"))
            .expect("lookup")
            .expect("entry");
        assert_eq!(entry.value, "ticketA");

        store.upsert("perforce:1666", "bob", None).expect("remove");
        assert!(store.list_all().expect("list").is_empty());
    }

    #[test]
    fn store_options_round_trip_through_serde() {
        let options = StoreOptions {
            lock_try: 7,
            temp_dir: Some(PathBuf::from("/var/tmp/p4auth")),
            ..StoreOptions::default()
        };

        let json = serde_json::to_string(&options).expect("serialize");
        let back: StoreOptions = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.lock_try, 7);
        assert_eq!(back.lock_delay, DEFAULT_LOCK_DELAY);
        assert_eq!(back.temp_dir, Some(PathBuf::from("/var/tmp/p4auth")));

        // Partial documents fall back per field, like the config file.
        let partial: StoreOptions = serde_json::from_str(r#"{"lock_try": 2}"#).expect("parse");
        assert_eq!(partial.lock_try, 2);
        assert_eq!(partial.lock_wait, DEFAULT_LOCK_WAIT);
    }
}
