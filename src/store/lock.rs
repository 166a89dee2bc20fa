//! Advisory lock file protocol for store files.
//!
//! A writer takes `<store>.lck` beside the target before rewriting it;
//! creating the lock file with create-new semantics is the acquisition. An
//! existing lock older than the staleness horizon is presumed abandoned and
//! reclaimed. A fresh one makes the writer sleep and retry, up to a bounded
//! number of attempts.
//!
//! The protocol is advisory only. Writers that ignore it still race on the
//! final rename, last writer winning outright.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::{AuthError, AuthResult};
use crate::store::StoreOptions;

/// Held while a store file is being rewritten. The lock file is removed on
/// drop; if that fails the next writer's staleness check reclaims it.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Acquires the lock guarding `target`, retrying per `options`.
    pub fn acquire(target: &Path, options: &StoreOptions) -> AuthResult<Self> {
        let path = lock_path(target);
        let attempts = options.lock_try.max(1);

        for attempt in 0..attempts {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    debug!(lock = %path.display(), attempt, "acquired auth file lock");
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path, options.lock_delay) {
                        warn!(lock = %path.display(), "removing stale auth file lock");
                        match fs::remove_file(&path) {
                            Ok(()) => {}
                            // The holder may have released it in between.
                            Err(err) if err.kind() == ErrorKind::NotFound => {}
                            Err(err) => return Err(AuthError::io(&path, err)),
                        }
                        continue;
                    }
                    thread::sleep(options.lock_wait);
                }
                Err(err) => return Err(AuthError::io(&path, err)),
            }
        }

        Err(AuthError::lock_timeout(path, attempts))
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            error!(lock = %self.path.display(), %err, "failed to remove auth file lock");
        }
    }
}

/// `<target>.lck`, in the same directory as the target.
pub fn lock_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".lck");
    PathBuf::from(name)
}

fn is_stale(path: &Path, horizon: Duration) -> bool {
    let modified = match fs::metadata(path).and_then(|meta| meta.modified()) {
        Ok(modified) => modified,
        Err(_) => return false,
    };
    match modified.elapsed() {
        Ok(age) => age > horizon,
        // Modification time in the future; leave it alone.
        Err(_) => false,
    }
}
