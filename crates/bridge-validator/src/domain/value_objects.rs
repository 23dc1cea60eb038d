//! # Domain Value Objects
//!
//! Immutable identifiers and small policy values.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Provider subnet identifier.
pub type Netuid = u16;

/// Opaque provider-network peer key (e.g. an SS58 hotkey).
///
/// Ordering is lexicographic on the key string and is used as the final
/// tie-break everywhere a deterministic order is needed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap a raw peer key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for PeerId {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Identity of a requesting-network caller.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerId {
    /// Caller key on the requesting network.
    pub key: String,
    /// Subnet the caller acts for, when it declares one.
    #[serde(default)]
    pub subnet_id: Option<Netuid>,
}

impl CallerId {
    /// Create a caller identity.
    pub fn new(key: impl Into<String>, subnet_id: Option<Netuid>) -> Self {
        Self {
            key: key.into(),
            subnet_id,
        }
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subnet_id {
            Some(netuid) => write!(f, "{}@{}", self.key, netuid),
            None => f.write_str(&self.key),
        }
    }
}

/// Network endpoint of a provider peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerEndpoint(SocketAddr);

impl PeerEndpoint {
    /// Wrap a socket address.
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// Extract `ip:port` from a free-form registry address.
    ///
    /// Accepts bare `1.2.3.4:8000` as well as URL-ish forms such as
    /// `http://1.2.3.4:8000/`. Returns `None` for anything without a
    /// parseable socket address.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let without_scheme = trimmed
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(trimmed);
        let host_port = without_scheme.split('/').next().unwrap_or_default();
        host_port.parse::<SocketAddr>().ok().map(Self)
    }

    /// Socket address.
    pub fn addr(&self) -> SocketAddr {
        self.0
    }

    /// Base URL for HTTP transports.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.0)
    }
}

impl fmt::Display for PeerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the dispatcher orders peers that rank equally on stake and liveness.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Shuffle each tier of equally-ranked peers.
    #[default]
    Shuffled,
    /// Order each tier by peer key; used for reproducible runs and tests.
    Lexicographic,
}

/// Outcome of a relay authorization check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Authorization {
    /// Caller may use the relay.
    Allowed,
    /// Caller is rejected; no peer calls may be issued.
    Denied {
        /// Human-readable reason
        reason: String,
    },
}

impl Authorization {
    /// Build a denial.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }
}
