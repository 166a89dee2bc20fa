//! File-backed persistence: tolerant reads and locked atomic rewrites.
//!
//! A rewrite never edits the store file in place. The updated content goes
//! to a fresh temp file created in the target's directory (same
//! filesystem), which is renamed over the target. Platforms where the
//! rename fails fall back to copying the temp's bytes over the target and
//! deleting the temp. Either way the original file stays intact until the
//! replacement lands, and the result is tightened to owner-read-only.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, error, instrument, warn};

use crate::error::{AuthError, AuthResult};
use crate::store::entry::{line_prefix, AuthEntry};
use crate::store::lock::LockFile;
use crate::store::StoreOptions;

/// Reads every parseable entry, in file order. A missing file is an empty
/// store, not an error. Bytes that are not valid UTF-8 are replaced rather
/// than failing the whole read.
pub fn read_entries(path: &Path) -> AuthResult<Vec<AuthEntry>> {
    Ok(read_raw_lines(path)?
        .iter()
        .filter_map(|line| AuthEntry::parse_line(line))
        .collect())
}

/// Rewrites `path` so it holds `value` for (server, user): replaces the
/// first matching line in place, appends when nothing matched, or drops the
/// line when `value` is `None`. All other lines, parseable or not, are
/// copied through unchanged.
///
/// `server_address` must already be canonical.
#[instrument(skip(path, value, options), fields(file = %path.display()))]
pub fn save_entry(
    path: &Path,
    server_address: &str,
    user_name: &str,
    value: Option<&str>,
    options: &StoreOptions,
) -> AuthResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| AuthError::io(parent, err))?;
        }
    }

    let _lock = LockFile::acquire(path, options)?;

    let prefix = line_prefix(server_address, user_name);
    let mut lines = Vec::new();
    let mut processed = false;
    for line in read_raw_lines(path)? {
        if !processed && line.starts_with(&prefix) {
            if let Some(value) = value {
                lines.push(format!("{prefix}{value}"));
            }
            processed = true;
        } else {
            lines.push(line);
        }
    }
    if !processed {
        if let Some(value) = value {
            lines.push(format!("{prefix}{value}"));
        }
    }

    let temp_dir = temp_dir_for(path, options);
    let mut temp = tempfile::Builder::new()
        .prefix("p4auth")
        .suffix(".txt")
        .tempfile_in(&temp_dir)
        .map_err(|err| AuthError::io(&temp_dir, err))?;

    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    temp.write_all(content.as_bytes())
        .and_then(|()| temp.flush())
        .map_err(|err| AuthError::io(temp.path(), err))?;

    if path.exists() {
        // A previous save left the target owner-read-only.
        if let Err(err) = make_writable(path) {
            warn!(file = %path.display(), %err, "could not restore write permission");
        }
    }

    replace_file(temp, path)?;

    if let Err(err) = tighten_permissions(path) {
        warn!(file = %path.display(), %err, "could not tighten auth file permissions");
    }

    debug!(removed = value.is_none(), "auth file rewritten");
    Ok(())
}

/// Substitutes `temp` for `target`, by rename when the platform allows it
/// and by copy-then-delete otherwise. The temp file is gone afterwards on
/// every path except total failure of both strategies.
fn replace_file(temp: NamedTempFile, target: &Path) -> AuthResult<()> {
    let temp = match temp.persist(target) {
        Ok(_) => return Ok(()),
        Err(persist_err) => {
            debug!(
                file = %target.display(),
                err = %persist_err.error,
                "rename failed, copying instead"
            );
            persist_err.file
        }
    };

    match fs::copy(temp.path(), target) {
        Ok(_) => {
            if let Err(err) = temp.close() {
                warn!(file = %target.display(), %err, "could not delete temp auth file");
            }
            Ok(())
        }
        Err(copy_err) => {
            error!(file = %target.display(), %copy_err, "copy fallback failed");
            if let Err(err) = temp.close() {
                warn!(file = %target.display(), %err, "could not delete temp auth file");
            }
            Err(AuthError::overwrite(target))
        }
    }
}

fn temp_dir_for(target: &Path, options: &StoreOptions) -> PathBuf {
    if let Some(dir) = &options.temp_dir {
        return dir.clone();
    }
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn read_raw_lines(path: &Path) -> AuthResult<Vec<String>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(AuthError::io(path, err)),
    };
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_string)
        .collect())
}

#[cfg(unix)]
fn make_writable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o200);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_writable(path: &Path) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(false);
    fs::set_permissions(path, perms)
}

#[cfg(unix)]
fn tighten_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o400))
}

#[cfg(not(unix))]
fn tighten_permissions(path: &Path) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)
}
