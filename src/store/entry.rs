//! Credential entry model and the line codec shared by ticket and trust
//! stores.
//!
//! A persisted store is a line-oriented text file, one entry per line:
//!
//! ```text
//! <server_address>=<user_name>:<secret_value>
//! ```
//!
//! The first `=` and the first `:` after it are the delimiters. Fields are
//! not escaped: a value may freely contain `=` or `:` (it is the
//! uninterpreted tail of the line), but a user name containing `:` splits
//! in the wrong place. That ambiguity is part of the on-disk format and is
//! kept as-is for compatibility with files written by `p4`.

use serde::{Deserialize, Serialize};

/// One credential line: a secret value keyed by (server address, user name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEntry {
    /// Server address in `host:port` form, canonicalized on construction.
    pub server_address: String,
    pub user_name: String,
    /// The ticket or fingerprint. Withheld when the entry is serialized.
    #[serde(skip_serializing)]
    pub value: String,
}

impl AuthEntry {
    pub fn new(server_address: &str, user_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            server_address: canonical_server_address(server_address),
            user_name: user_name.into(),
            value: value.into(),
        }
    }

    /// Parses one store line. Returns `None` for lines missing either
    /// delimiter or carrying an empty value; such lines are invisible to
    /// lookups but are copied through rewrites untouched.
    ///
    /// Persisted lines are already canonical, so no address rewriting
    /// happens here.
    pub fn parse_line(line: &str) -> Option<Self> {
        let eq = line.find('=')?;
        let colon = eq + line[eq..].find(':')?;
        if colon + 1 >= line.len() {
            return None;
        }
        Some(Self {
            server_address: line[..eq].to_string(),
            user_name: line[eq + 1..colon].to_string(),
            value: line[colon + 1..].to_string(),
        })
    }

    /// Renders the entry in its persisted form, without a line terminator.
    pub fn to_line(&self) -> String {
        format!("{}={}:{}", self.server_address, self.user_name, self.value)
    }

    /// Matches against an already-canonicalized server address. With no
    /// user name given, any user on that server matches.
    pub fn matches(&self, server_address: &str, user_name: Option<&str>) -> bool {
        if self.server_address != server_address {
            return false;
        }
        match user_name {
            Some(user) => self.user_name == user,
            None => true,
        }
    }
}

/// The `server=user:` prefix identifying an entry's line in a store file.
pub fn line_prefix(server_address: &str, user_name: &str) -> String {
    format!("{server_address}={user_name}:")
}

/// Normalizes a server address for storage and comparison: an address with
/// no port separator at all gets a `localhost:` prefix, so `1666` and
/// `localhost:1666` name the same entry. Anything already containing a
/// colon, including bracketed IPv6 forms like `[fc01::ff]:1702`, is left
/// untouched.
pub fn canonical_server_address(server_address: &str) -> String {
    if server_address.contains(':') {
        server_address.to_string()
    } else {
        format!("localhost:{server_address}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_line() {
        let entry = AuthEntry::parse_line("perforce:1666=bob:ticketA").expect("should parse");

        assert_eq!(entry.server_address, "perforce:1666");
        assert_eq!(entry.user_name, "bob");
        assert_eq!(entry.value, "ticketA");
    }

    #[test]
    fn value_keeps_embedded_delimiters() {
        let entry = AuthEntry::parse_line("localhost:1666=alice:AB=CD:EF").expect("should parse");

        assert_eq!(entry.user_name, "alice");
        assert_eq!(entry.value, "AB=CD:EF");
    }

    #[test]
    fn rejects_lines_missing_delimiters_or_value() {
        // No '=' at all; the colon alone does not make an entry.
        assert!(AuthEntry::parse_line("perforce:1666").is_none());
        // No ':' after the '='.
        assert!(AuthEntry::parse_line("perforce=bob").is_none());
        // Delimiters present but the value is empty.
        assert!(AuthEntry::parse_line("perforce:1666=bob:").is_none());
        assert!(AuthEntry::parse_line("").is_none());
    }

    #[test]
    fn user_name_with_colon_splits_at_the_wrong_place() {
        // Inherited format ambiguity: the first ':' after '=' wins, so a
        // user name containing ':' bleeds into the value.
        let entry = AuthEntry::parse_line("svr:1666=us:er:V").expect("should parse");

        assert_eq!(entry.user_name, "us");
        assert_eq!(entry.value, "er:V");
    }

    #[test]
    fn canonicalization_prefixes_portless_addresses() {
        assert_eq!(canonical_server_address("1666"), "localhost:1666");
        assert_eq!(canonical_server_address("myserver"), "localhost:myserver");
        assert_eq!(canonical_server_address("perforce:1666"), "perforce:1666");
        assert_eq!(
            canonical_server_address("[fc01:5034:3390:2:20e:cff:fe2f:b74d]:1702"),
            "[fc01:5034:3390:2:20e:cff:fe2f:b74d]:1702"
        );
    }

    #[test]
    fn new_canonicalizes_the_server_address() {
        let entry = AuthEntry::new("1666", "alice", "T1");

        assert_eq!(entry.server_address, "localhost:1666");
        assert_eq!(entry.to_line(), "localhost:1666=alice:T1");
    }

    #[test]
    fn line_round_trips_through_the_codec() {
        let entry = AuthEntry::new("perforce:1666", "bob", "ticketB");
        let reparsed = AuthEntry::parse_line(&entry.to_line()).expect("should parse");

        assert_eq!(reparsed, entry);
    }
}
