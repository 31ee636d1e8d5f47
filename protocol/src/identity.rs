//! # Node Identity
//!
//! Every node — seed or peer — is addressed by a `(host, port)` pair.
//! Identities compare by exact equality of both fields; there is no
//! cryptographic binding between an identity and the node that holds it
//! (see the crate-level Non-goals: no node authentication).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A node's address: a host (dotted-quad or hostname) and a 16-bit port.
///
/// The canonical string form is `HOST:PORT`, used both for wire
/// serialization of composite keys (e.g. gossip `msg_id`) and for
/// deterministic ordering in the overlay builder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub host: String,
    pub port: u16,
}

impl NodeId {
    /// Builds a new identity from a host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Canonical `HOST:PORT` string form.
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Error parsing a `NodeId` from its canonical string form.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NodeIdParseError {
    #[error("missing ':' or ',' separator in node identity: {0:?}")]
    MissingSeparator(String),
    #[error("empty host in node identity: {0:?}")]
    EmptyHost(String),
    #[error("invalid port in node identity {0:?}: {1}")]
    InvalidPort(String, String),
}

impl FromStr for NodeId {
    type Err = NodeIdParseError;

    /// Parses `HOST:PORT` or `HOST,PORT` (the two separators spec.md §4.2
    /// allows for the seed-list file format, reused here for any line-based
    /// node identity input).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sep_idx = s
            .find([':', ','])
            .ok_or_else(|| NodeIdParseError::MissingSeparator(s.to_string()))?;
        let host = s[..sep_idx].trim();
        let port_str = s[sep_idx + 1..].trim();

        if host.is_empty() {
            return Err(NodeIdParseError::EmptyHost(s.to_string()));
        }

        let port: u16 = port_str
            .parse()
            .map_err(|e: std::num::ParseIntError| {
                NodeIdParseError::InvalidPort(s.to_string(), e.to_string())
            })?;

        Ok(NodeId::new(host, port))
    }
}
