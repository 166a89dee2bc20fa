//! Store location and lock tuning configuration.
//!
//! Values are resolved in three layers: built-in defaults, then a per-user
//! config file, then environment variables (`P4TICKETS`, `P4TRUST` and the
//! `P4AUTH_LOCK_*` knobs). Environment always wins so managed deployments
//! can redirect auth files without touching the config file. A malformed
//! config file or variable is logged and ignored, never fatal.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AuthError, AuthResult};
use crate::store::{StoreOptions, DEFAULT_LOCK_DELAY, DEFAULT_LOCK_TRY, DEFAULT_LOCK_WAIT};

/// Environment variable naming the tickets file, as honored by `p4`.
pub const P4TICKETS_ENV: &str = "P4TICKETS";
/// Environment variable naming the trust file, as honored by `p4`.
pub const P4TRUST_ENV: &str = "P4TRUST";

const LOCK_TRY_ENV: &str = "P4AUTH_LOCK_TRY";
const LOCK_DELAY_ENV: &str = "P4AUTH_LOCK_DELAY_MS";
const LOCK_WAIT_ENV: &str = "P4AUTH_LOCK_WAIT_MS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Tickets file; `None` means the platform default next to the home
    /// directory.
    pub ticket_path: Option<PathBuf>,
    /// Trust file; `None` means the platform default.
    pub trust_path: Option<PathBuf>,
    pub lock_try: u32,
    pub lock_delay_ms: u64,
    pub lock_wait_ms: u64,
}

fn env_path_opt(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Parses an environment variable into the target field's type. Values
/// that do not parse, including integers too large for the field, are
/// ignored in favor of the configured default.
fn env_parse_opt<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable lock tuning variable");
            None
        }
    }
}

fn config_path() -> PathBuf {
    if cfg!(windows) {
        let appdata = std::env::var_os("APPDATA")
            .unwrap_or_else(|| std::env::var_os("USERPROFILE").unwrap_or_default());
        let mut path = PathBuf::from(appdata);
        path.push("p4auth");
        path.push("config.json");
        path
    } else {
        let home = std::env::var_os("HOME").unwrap_or_default();
        let mut path = PathBuf::from(home);
        path.push(".p4auth");
        path.push("config.json");
        path
    }
}

fn load_from_file(path: &Path) -> Option<AuthConfig> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(config) => Some(config),
        Err(err) => {
            warn!(file = %path.display(), %err, "ignoring malformed config file");
            None
        }
    }
}

impl AuthConfig {
    fn apply_env_overrides(&mut self) {
        if let Some(path) = env_path_opt(P4TICKETS_ENV) {
            self.ticket_path = Some(path);
        }
        if let Some(path) = env_path_opt(P4TRUST_ENV) {
            self.trust_path = Some(path);
        }
        if let Some(value) = env_parse_opt(LOCK_TRY_ENV) {
            self.lock_try = value;
        }
        if let Some(value) = env_parse_opt(LOCK_DELAY_ENV) {
            self.lock_delay_ms = value;
        }
        if let Some(value) = env_parse_opt(LOCK_WAIT_ENV) {
            self.lock_wait_ms = value;
        }
    }

    pub fn load() -> Self {
        let path = config_path();
        let mut config = load_from_file(&path).unwrap_or_default();
        config.apply_env_overrides();
        config
    }

    pub fn save_to_file(&self) -> AuthResult<()> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AuthError::io(parent, err))?;
        }

        let payload = serde_json::to_string_pretty(self)
            .map_err(|err| AuthError::io(&path, err.into()))?;
        fs::write(&path, payload).map_err(|err| AuthError::io(&path, err))?;
        Ok(())
    }

    /// The tickets file this configuration points at: the explicit path if
    /// set (config file or `P4TICKETS`), the platform default otherwise.
    pub fn tickets_file(&self) -> AuthResult<PathBuf> {
        match &self.ticket_path {
            Some(path) => Ok(path.clone()),
            None => default_tickets_file(),
        }
    }

    /// The trust file this configuration points at.
    pub fn trust_file(&self) -> AuthResult<PathBuf> {
        match &self.trust_path {
            Some(path) => Ok(path.clone()),
            None => default_trust_file(),
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            lock_try: self.lock_try,
            lock_delay: Duration::from_millis(self.lock_delay_ms),
            lock_wait: Duration::from_millis(self.lock_wait_ms),
            temp_dir: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            ticket_path: None,
            trust_path: None,
            lock_try: DEFAULT_LOCK_TRY,
            lock_delay_ms: DEFAULT_LOCK_DELAY.as_millis() as u64,
            lock_wait_ms: DEFAULT_LOCK_WAIT.as_millis() as u64,
        }
    }
}

/// `%USERPROFILE%\p4tickets.txt` on Windows, `~/.p4tickets` elsewhere.
pub fn default_tickets_file() -> AuthResult<PathBuf> {
    let home = dirs::home_dir().ok_or(AuthError::NoHomeDirectory)?;
    Ok(home.join(if cfg!(windows) {
        "p4tickets.txt"
    } else {
        ".p4tickets"
    }))
}

/// `%USERPROFILE%\p4trust.txt` on Windows, `~/.p4trust` elsewhere.
pub fn default_trust_file() -> AuthResult<PathBuf> {
    let home = dirs::home_dir().ok_or(AuthError::NoHomeDirectory)?;
    Ok(home.join(if cfg!(windows) {
        "p4trust.txt"
    } else {
        ".p4trust"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_paths_win_over_defaults() {
        let config = AuthConfig {
            ticket_path: Some(PathBuf::from("/tmp/tickets")),
            trust_path: Some(PathBuf::from("/tmp/trust")),
            ..AuthConfig::default()
        };

        assert_eq!(config.tickets_file().expect("path"), PathBuf::from("/tmp/tickets"));
        assert_eq!(config.trust_file().expect("path"), PathBuf::from("/tmp/trust"));
    }

    #[test]
    fn store_options_carry_the_lock_tuning() {
        let config = AuthConfig {
            lock_try: 7,
            lock_delay_ms: 2_000,
            lock_wait_ms: 50,
            ..AuthConfig::default()
        };

        let options = config.store_options();
        assert_eq!(options.lock_try, 7);
        assert_eq!(options.lock_delay, Duration::from_secs(2));
        assert_eq!(options.lock_wait, Duration::from_millis(50));
    }

    #[test]
    fn defaults_match_the_documented_tuning() {
        let config = AuthConfig::default();
        assert_eq!(config.lock_try, 100);
        assert_eq!(config.lock_delay_ms, 300_000);
        assert_eq!(config.lock_wait_ms, 1_000);
    }

    #[test]
    fn partial_config_files_fall_back_per_field() {
        let config: AuthConfig =
            serde_json::from_str(r#"{"lock_try": 5}"#).expect("should parse");

        assert_eq!(config.lock_try, 5);
        assert_eq!(config.lock_wait_ms, 1_000);
        assert!(config.ticket_path.is_none());
    }

    // Owns every assertion involving P4TICKETS/P4TRUST so no other test
    // races on the process environment.
    #[test]
    fn env_vars_override_ticket_and_trust_paths() {
        std::env::remove_var(P4TICKETS_ENV);
        std::env::remove_var(P4TRUST_ENV);

        let default_tickets = default_tickets_file().expect("home");
        let mut config = AuthConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.tickets_file().expect("path"), default_tickets);

        std::env::set_var(P4TICKETS_ENV, "/srv/p4/tickets");
        std::env::set_var(P4TRUST_ENV, "/srv/p4/trust");
        let mut config = AuthConfig::default();
        config.apply_env_overrides();
        std::env::remove_var(P4TICKETS_ENV);
        std::env::remove_var(P4TRUST_ENV);

        assert_eq!(
            config.tickets_file().expect("path"),
            PathBuf::from("/srv/p4/tickets")
        );
        assert_eq!(
            config.trust_file().expect("path"),
            PathBuf::from("/srv/p4/trust")
        );
    }

    // Owns the P4AUTH_LOCK_* variables for the same reason.
    #[test]
    fn out_of_range_lock_tuning_envs_keep_the_defaults() {
        std::env::set_var(LOCK_TRY_ENV, "4294967297");
        std::env::set_var(LOCK_DELAY_ENV, "2500");
        std::env::set_var(LOCK_WAIT_ENV, "soon");
        let mut config = AuthConfig::default();
        config.apply_env_overrides();
        std::env::remove_var(LOCK_TRY_ENV);
        std::env::remove_var(LOCK_DELAY_ENV);
        std::env::remove_var(LOCK_WAIT_ENV);

        // 4294967297 does not fit in u32 and must not wrap to 1.
        assert_eq!(config.lock_try, DEFAULT_LOCK_TRY);
        assert_eq!(config.lock_delay_ms, 2_500);
        assert_eq!(config.lock_wait_ms, 1_000);
    }
}
