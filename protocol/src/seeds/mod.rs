//! # Seed Directory
//!
//! The fixed, ordered list of seed identities that together form the
//! membership authority. Loaded once at process start from a text resource
//! and never mutated afterward — every seed in the cluster is expected to
//! load the same list, independently, from its own copy of the config.

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::identity::{NodeId, NodeIdParseError};

/// Errors loading a seed directory from its text form.
#[derive(Debug, thiserror::Error)]
pub enum SeedDirectoryError {
    #[error("seed directory is empty")]
    Empty,
    #[error("line {line}: {source}")]
    BadLine {
        line: usize,
        #[source]
        source: NodeIdParseError,
    },
}

/// The immutable, ordered set of seed identities.
#[derive(Debug, Clone)]
pub struct SeedDirectory {
    seeds: Vec<NodeId>,
}

impl SeedDirectory {
    /// Parses a seed directory from its text form: one seed per line,
    /// `host:port` or `host,port`, blank lines and `#`-prefixed comments
    /// ignored, whitespace trimmed.
    pub fn parse(text: &str) -> Result<Self, SeedDirectoryError> {
        let mut seeds = Vec::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let id = NodeId::from_str(line).map_err(|source| SeedDirectoryError::BadLine {
                line: idx + 1,
                source,
            })?;
            seeds.push(id);
        }

        if seeds.is_empty() {
            return Err(SeedDirectoryError::Empty);
        }

        if seeds.len() == 1 {
            // Valid per spec (quorum = 1, self-approval), but it defeats the
            // purpose of running a consensus cluster at all.
            warn!(
                "seed directory has only one seed — quorum is 1, every proposal \
                 self-approves with no cross-seed agreement"
            );
        }

        Ok(Self { seeds })
    }

    /// Loads a seed directory from a file path.
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// All seeds, in load order.
    pub fn seeds(&self) -> &[NodeId] {
        &self.seeds
    }

    /// Number of seeds in the cluster (`n_seeds`).
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    /// `seed_quorum = floor(n_seeds/2) + 1`, computed fresh each call but
    /// always the same value for the lifetime of an immutable directory.
    pub fn quorum(&self) -> usize {
        self.seeds.len() / 2 + 1
    }

    /// Whether the given identity is one of the seeds.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.seeds.iter().any(|s| s == id)
    }

    /// The other seeds, excluding `self_id`. Used when fanning out
    /// PROPOSE_* / SYNC_MEMBERSHIP messages.
    pub fn others(&self, self_id: &NodeId) -> Vec<NodeId> {
        self.seeds.iter().filter(|s| *s != self_id).cloned().collect()
    }
}

impl fmt::Display for SeedDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.seeds.iter().map(|s| s.to_string()).collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}
