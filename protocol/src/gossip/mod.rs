//! # Gossip Engine
//!
//! Capped-generation, content-hash-deduplicated message dissemination
//! between peers. Adapted from the teacher's `network::gossip::
//! GossipProtocol` (dedup + forwarding), swapping its BLAKE3/TTL scheme for
//! the hard per-origin generation cap and SHA-256 `msg_id ∥ body` hash this
//! protocol's wire format specifies.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::config::MAX_GOSSIP;
use crate::identity::NodeId;
use crate::wire::message::Message;

/// Computes `SHA-256(msg_id ∥ body)` as a lowercase hex string.
pub fn content_hash(msg_id: &str, body: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(msg_id.as_bytes());
    if let Some(b) = body {
        hasher.update(b.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// What a caller should do after feeding a `GOSSIP` message to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GossipAction {
    /// First time seen, hash verified: forward to these neighbors (already
    /// excludes the immediate sender).
    Forward { to: Vec<NodeId> },
    /// Already seen, or the hash didn't check out. Nothing further to do.
    Drop,
}

/// Generates capped outbound gossip and dedups/forwards inbound gossip for
/// one peer.
pub struct GossipEngine {
    self_id: NodeId,
    seen_hashes: DashMap<String, ()>,
    generation_seq: std::sync::atomic::AtomicU32,
}

impl GossipEngine {
    pub fn new(self_id: NodeId) -> Self {
        Self {
            self_id,
            seen_hashes: DashMap::new(),
            generation_seq: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// Produces the next outbound generation, or `None` once
    /// [`MAX_GOSSIP`] generations have already been emitted.
    ///
    /// `timestamp` is supplied by the caller (an RFC3339 string) rather
    /// than read from the wall clock here, keeping this function pure and
    /// trivially testable.
    pub fn generate(&self, timestamp: &str, body: Option<String>) -> Option<Message> {
        let seq = self
            .generation_seq
            .fetch_update(
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
                |s| if s < MAX_GOSSIP { Some(s + 1) } else { None },
            )
            .ok()?
            + 1;

        let msg_id = format!(
            "{}:{}:{}:{}",
            timestamp, self.self_id.host, self.self_id.port, seq
        );
        let hash = content_hash(&msg_id, body.as_deref());

        // Register our own generation as seen so we never re-forward it if
        // it loops back to us through the overlay.
        self.seen_hashes.insert(hash.clone(), ());

        Some(Message::Gossip {
            msg_id,
            body,
            hash,
            sender: self.self_id.clone(),
        })
    }

    /// How many generations this engine has emitted so far.
    pub fn generations_emitted(&self) -> u32 {
        self.generation_seq.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Handles an inbound `GOSSIP` message. `neighbors` is the current
    /// neighbor set; `sender` is excluded from the forward list.
    pub fn handle_gossip(
        &self,
        msg_id: &str,
        body: Option<&str>,
        hash: &str,
        sender: &NodeId,
        neighbors: &[NodeId],
    ) -> GossipAction {
        let expected = content_hash(msg_id, body);
        if expected != hash {
            warn!(%msg_id, "gossip hash mismatch, dropping");
            return GossipAction::Drop;
        }

        // `entry().or_insert` is the atomic "insert if absent, tell me
        // whether it was already there" DashMap does not expose directly,
        // so check-then-insert under the shard lock via `get_or_insert`.
        let mut already_seen = true;
        self.seen_hashes.entry(hash.to_string()).or_insert_with(|| {
            already_seen = false;
        });

        if already_seen {
            return GossipAction::Drop;
        }

        let to: Vec<NodeId> = neighbors.iter().filter(|n| *n != sender).cloned().collect();
        GossipAction::Forward { to }
    }

    pub fn seen_count(&self) -> usize {
        self.seen_hashes.len()
    }

    /// Stable hash of an arbitrary string, used only for constructing
    /// deterministic overlay-sampling seeds from a node's own identity
    /// where a caller wants a `u64` without pulling in a second hashing
    /// dependency just for that.
    pub fn stable_seed(input: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        input.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(p: u16) -> NodeId {
        NodeId::new("127.0.0.1", p)
    }

    #[test]
    fn generate_produces_increasing_seq_and_stops_at_max() {
        let engine = GossipEngine::new(id(7000));
        for expected_seq in 1..=MAX_GOSSIP {
            let msg = engine.generate("2026-07-27T00:00:00Z", None).unwrap();
            match msg {
                Message::Gossip { msg_id, .. } => {
                    assert!(msg_id.ends_with(&format!(":{}", expected_seq)));
                }
                _ => panic!("expected Gossip"),
            }
        }
        assert!(engine.generate("2026-07-27T00:00:01Z", None).is_none());
        assert_eq!(engine.generations_emitted(), MAX_GOSSIP);
    }

    #[test]
    fn generate_sets_a_verifiable_hash() {
        let engine = GossipEngine::new(id(7000));
        let msg = engine
            .generate("2026-07-27T00:00:00Z", Some("hello".into()))
            .unwrap();
        match msg {
            Message::Gossip { msg_id, body, hash, .. } => {
                assert_eq!(hash, content_hash(&msg_id, body.as_deref()));
            }
            _ => panic!("expected Gossip"),
        }
    }

    #[test]
    fn handle_gossip_forwards_on_first_receipt_excluding_sender() {
        let engine = GossipEngine::new(id(7000));
        let msg_id = "t:a:7001:1";
        let hash = content_hash(msg_id, None);
        let neighbors = vec![id(7001), id(7002), id(7003)];
        let action = engine.handle_gossip(msg_id, None, &hash, &id(7001), &neighbors);
        match action {
            GossipAction::Forward { to } => {
                assert_eq!(to, vec![id(7002), id(7003)]);
            }
            GossipAction::Drop => panic!("expected Forward"),
        }
    }

    #[test]
    fn handle_gossip_drops_duplicate_on_second_receipt() {
        let engine = GossipEngine::new(id(7000));
        let msg_id = "t:a:7001:1";
        let hash = content_hash(msg_id, None);
        let neighbors = vec![id(7001), id(7002)];
        engine.handle_gossip(msg_id, None, &hash, &id(7001), &neighbors);
        let second = engine.handle_gossip(msg_id, None, &hash, &id(7002), &neighbors);
        assert_eq!(second, GossipAction::Drop);
    }

    #[test]
    fn handle_gossip_drops_on_hash_mismatch() {
        let engine = GossipEngine::new(id(7000));
        let action = engine.handle_gossip("t:a:7001:1", None, "not-the-real-hash", &id(7001), &[]);
        assert_eq!(action, GossipAction::Drop);
    }

    #[test]
    fn content_hash_changes_with_body() {
        let h1 = content_hash("m1", None);
        let h2 = content_hash("m1", Some("x"));
        assert_ne!(h1, h2);
    }

    #[test]
    fn seen_count_increments_on_new_hashes_only() {
        let engine = GossipEngine::new(id(7000));
        let msg_id = "t:a:7001:1";
        let hash = content_hash(msg_id, None);
        engine.handle_gossip(msg_id, None, &hash, &id(7001), &[]);
        engine.handle_gossip(msg_id, None, &hash, &id(7001), &[]);
        assert_eq!(engine.seen_count(), 1);
    }
}
