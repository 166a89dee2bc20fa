//! Typed server addresses.
//!
//! A Perforce server is named by a URI of the form
//! `protocol://host:port[?query]`, where the protocol picks the transport
//! implementation. The transports themselves live elsewhere; this module
//! carries the addressing metadata: which schemes exist, which are SSL, and
//! how to get from a URI to the `host:port` form the credential stores key
//! on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// The known client protocols, one per URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    P4Java,
    P4JavaSsl,
    P4Jrpc,
    P4JrpcSsl,
    P4JrpcNts,
    P4JrpcNtsSsl,
    P4Jrsh,
    P4JrshNts,
}

impl Protocol {
    pub const ALL: [Protocol; 8] = [
        Protocol::P4Java,
        Protocol::P4JavaSsl,
        Protocol::P4Jrpc,
        Protocol::P4JrpcSsl,
        Protocol::P4JrpcNts,
        Protocol::P4JrpcNtsSsl,
        Protocol::P4Jrsh,
        Protocol::P4JrshNts,
    ];

    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "p4java" => Some(Self::P4Java),
            "p4javassl" => Some(Self::P4JavaSsl),
            "p4jrpc" => Some(Self::P4Jrpc),
            "p4jrpcssl" => Some(Self::P4JrpcSsl),
            "p4jrpcnts" => Some(Self::P4JrpcNts),
            "p4jrpcntsssl" => Some(Self::P4JrpcNtsSsl),
            "p4jrsh" => Some(Self::P4Jrsh),
            "p4jrshnts" => Some(Self::P4JrshNts),
            _ => None,
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Self::P4Java => "p4java",
            Self::P4JavaSsl => "p4javassl",
            Self::P4Jrpc => "p4jrpc",
            Self::P4JrpcSsl => "p4jrpcssl",
            Self::P4JrpcNts => "p4jrpcnts",
            Self::P4JrpcNtsSsl => "p4jrpcntsssl",
            Self::P4Jrsh => "p4jrsh",
            Self::P4JrshNts => "p4jrshnts",
        }
    }

    /// Whether the transport runs over SSL; these servers get trust
    /// fingerprints pinned.
    pub fn is_secure(&self) -> bool {
        matches!(self, Self::P4JavaSsl | Self::P4JrpcSsl | Self::P4JrpcNtsSsl)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// A parsed server URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAddress {
    pub protocol: Protocol,
    /// Host name or address; IPv6 literals are stored without brackets.
    pub host: String,
    pub port: u16,
    /// Raw query string, kept verbatim.
    pub query: Option<String>,
}

impl ServerAddress {
    pub fn parse(uri: &str) -> AuthResult<Self> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| AuthError::invalid_address(uri, "missing protocol separator"))?;
        let protocol = Protocol::from_scheme(scheme).ok_or_else(|| {
            AuthError::invalid_address(uri, format!("unknown protocol {scheme:?}"))
        })?;

        let (authority, query) = match rest.split_once('?') {
            Some((authority, query)) => (authority, Some(query.to_string())),
            None => (rest, None),
        };

        let (host, port) = split_host_port(authority)
            .ok_or_else(|| AuthError::invalid_address(uri, "expected host:port"))?;
        if host.is_empty() {
            return Err(AuthError::invalid_address(uri, "empty host"));
        }
        let port = port
            .parse()
            .map_err(|_| AuthError::invalid_address(uri, format!("invalid port {port:?}")))?;

        Ok(Self {
            protocol,
            host: host.to_string(),
            port,
            query,
        })
    }

    /// The `host:port` form used as a store key. IPv6 hosts keep their
    /// brackets so the address already counts as ported and is never
    /// rewritten by canonicalization.
    pub fn host_port(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.host_port())?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

fn split_host_port(authority: &str) -> Option<(&str, &str)> {
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = after.strip_prefix(':')?;
        Some((host, port))
    } else {
        authority.rsplit_once(':')
    }
}
