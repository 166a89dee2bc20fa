//! Error types shared by the ticket and trust stores.

use std::path::PathBuf;

use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Error, Debug)]
pub enum AuthError {
    /// I/O failure while reading or rewriting a store file.
    #[error("auth file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The advisory lock file could not be acquired within the configured
    /// number of attempts.
    #[error("auth file lock {}: gave up after {attempts} attempts", .path.display())]
    LockTimeout { path: PathBuf, attempts: u32 },

    /// Neither the rename nor the copy fallback managed to replace the
    /// target file.
    #[error("auth file {} could not be overwritten", .path.display())]
    Overwrite { path: PathBuf },

    /// A server URI or address string that does not parse.
    #[error("invalid server address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: String },

    /// No home directory available to resolve a default store path.
    #[error("no home directory available to locate the default auth file")]
    NoHomeDirectory,
}

impl AuthError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn lock_timeout(path: impl Into<PathBuf>, attempts: u32) -> Self {
        Self::LockTimeout {
            path: path.into(),
            attempts,
        }
    }

    pub fn overwrite(path: impl Into<PathBuf>) -> Self {
        Self::Overwrite { path: path.into() }
    }

    pub fn invalid_address(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
