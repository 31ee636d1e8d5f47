//! # Proposal Records
//!
//! The transient, in-memory record a seed keeps while running consensus on
//! a single membership change. Created on REGISTER_REQUEST or
//! DEAD_NODE_REPORT, discarded once it reaches a terminal state.

use std::collections::HashMap;
use std::time::Instant;

use uuid::Uuid;

use crate::identity::NodeId;
use crate::wire::message::{ProposalKind, Vote};

/// Where a proposal currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
}

/// A single seed-quorum proposal in flight.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub proposal_id: Uuid,
    pub kind: ProposalKind,
    pub subject_peer: NodeId,
    pub originator_seed: NodeId,
    pub votes: HashMap<NodeId, Vote>,
    pub deadline: Instant,
    pub status: ProposalStatus,
}

impl Proposal {
    pub fn new(
        proposal_id: Uuid,
        kind: ProposalKind,
        subject_peer: NodeId,
        originator_seed: NodeId,
        deadline: Instant,
    ) -> Self {
        Self {
            proposal_id,
            kind,
            subject_peer,
            originator_seed,
            votes: HashMap::new(),
            deadline,
            status: ProposalStatus::Pending,
        }
    }

    /// Records a vote, overwriting any prior vote from the same seed (a
    /// seed re-voting on the same proposal is treated as a correction, not
    /// a double-count — `yes_count` always reflects the latest tally).
    pub fn record_vote(&mut self, voter: NodeId, vote: Vote) {
        self.votes.insert(voter, vote);
    }

    pub fn yes_count(&self) -> usize {
        self.votes.values().filter(|v| **v == Vote::Yes).count()
    }

    pub fn no_count(&self) -> usize {
        self.votes.values().filter(|v| **v == Vote::No).count()
    }

    /// Whether YES votes so far meet `seed_quorum`.
    pub fn has_quorum(&self, seed_quorum: usize) -> bool {
        self.yes_count() >= seed_quorum
    }

    /// Whether YES can still mathematically reach `seed_quorum` given
    /// `total_seeds` total voters and the votes collected so far.
    pub fn can_still_reach_quorum(&self, seed_quorum: usize, total_seeds: usize) -> bool {
        let outstanding = total_seeds.saturating_sub(self.votes.len());
        self.yes_count() + outstanding >= seed_quorum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn id(p: u16) -> NodeId {
        NodeId::new("127.0.0.1", p)
    }

    fn fresh_proposal() -> Proposal {
        Proposal::new(
            Uuid::new_v4(),
            ProposalKind::Register,
            id(7000),
            id(6000),
            Instant::now() + Duration::from_secs(3),
        )
    }

    #[test]
    fn starts_pending_with_no_votes() {
        let p = fresh_proposal();
        assert_eq!(p.status, ProposalStatus::Pending);
        assert_eq!(p.yes_count(), 0);
    }

    #[test]
    fn records_votes_and_tallies_yes() {
        let mut p = fresh_proposal();
        p.record_vote(id(6000), Vote::Yes);
        p.record_vote(id(6001), Vote::Yes);
        p.record_vote(id(6002), Vote::No);
        assert_eq!(p.yes_count(), 2);
        assert_eq!(p.no_count(), 1);
    }

    #[test]
    fn re_voting_overwrites_not_doublecounts() {
        let mut p = fresh_proposal();
        p.record_vote(id(6000), Vote::Yes);
        p.record_vote(id(6000), Vote::No);
        assert_eq!(p.yes_count(), 0);
        assert_eq!(p.no_count(), 1);
        assert_eq!(p.votes.len(), 1);
    }

    #[test]
    fn has_quorum_true_once_yes_reaches_threshold() {
        let mut p = fresh_proposal();
        p.record_vote(id(6000), Vote::Yes);
        assert!(!p.has_quorum(2));
        p.record_vote(id(6001), Vote::Yes);
        assert!(p.has_quorum(2));
    }

    #[test]
    fn can_still_reach_quorum_false_once_impossible() {
        let mut p = fresh_proposal();
        p.record_vote(id(6000), Vote::No);
        p.record_vote(id(6001), Vote::No);
        // 3 total seeds, quorum 2, 2 NOs already in with 1 outstanding:
        // max possible yes = 0 (already voted) + 1 outstanding = 1 < 2.
        assert!(!p.can_still_reach_quorum(2, 3));
    }

    #[test]
    fn can_still_reach_quorum_true_while_outstanding_votes_remain() {
        let mut p = fresh_proposal();
        p.record_vote(id(6000), Vote::Yes);
        assert!(p.can_still_reach_quorum(2, 3));
    }
}
