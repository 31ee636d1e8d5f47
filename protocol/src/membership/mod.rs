//! # Membership Store
//!
//! The replicated set of peer identities a seed currently considers alive.
//! Guarded by a single `parking_lot::RwLock`, matching the teacher's
//! `RwLock<HashSet<String>>` peer set pattern. Mutation is `pub(crate)`,
//! reachable only from [`crate::consensus::Coordinator`]'s commit path —
//! every other caller only ever sees a [`MembershipStore::snapshot`].

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use parking_lot::RwLock;

use crate::identity::NodeId;

pub mod proposal;

/// The set of peers a seed currently considers alive, plus insertion
/// metadata for diagnostics.
pub struct MembershipStore {
    members: RwLock<HashSet<NodeId>>,
    registered_at: RwLock<HashMap<NodeId, Instant>>,
}

impl MembershipStore {
    pub fn new() -> Self {
        Self {
            members: RwLock::new(HashSet::new()),
            registered_at: RwLock::new(HashMap::new()),
        }
    }

    /// Whether `peer` is currently a member.
    pub fn contains(&self, peer: &NodeId) -> bool {
        self.members.read().contains(peer)
    }

    /// A consistent point-in-time copy of the membership set. Cloning under
    /// the read lock means callers never observe a torn read even if a
    /// commit runs concurrently.
    pub fn snapshot(&self) -> HashSet<NodeId> {
        self.members.read().clone()
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Inserts `peer`, recording the insertion time. Returns `true` if the
    /// peer was not already present. Reachable only from the consensus
    /// commit path and seed sync's union step.
    pub(crate) fn insert(&self, peer: NodeId) -> bool {
        let inserted = self.members.write().insert(peer.clone());
        if inserted {
            self.registered_at.write().insert(peer, Instant::now());
        }
        inserted
    }

    /// Removes `peer`. Returns `true` if it was present.
    pub(crate) fn remove(&self, peer: &NodeId) -> bool {
        let removed = self.members.write().remove(peer);
        if removed {
            self.registered_at.write().remove(peer);
        }
        removed
    }

    /// When `peer` was inserted, if it is currently a member.
    pub fn registered_at(&self, peer: &NodeId) -> Option<Instant> {
        self.registered_at.read().get(peer).copied()
    }

    /// Unions `members` into the store, used by the anti-entropy sync loop.
    /// Returns the members that were newly learned. Never removes anything
    /// — sync is monotonic by construction.
    pub(crate) fn union(&self, members: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
        let mut newly_learned = Vec::new();
        for member in members {
            if self.insert(member.clone()) {
                newly_learned.push(member);
            }
        }
        newly_learned
    }
}

impl Default for MembershipStore {
    fn default() -> Self {
        Self::new()
    }
}
