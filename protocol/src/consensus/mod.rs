//! # Consensus Coordinator (seed side)
//!
//! Runs REGISTER/REMOVE proposals to completion: collects votes from the
//! rest of the seed cluster, commits to the [`MembershipStore`] on quorum,
//! and reports APPROVED/REJECTED once the outcome is decided. The
//! coordinator is transport-agnostic — it never opens a socket itself. It
//! returns the messages that need to be sent and lets the caller (the
//! seed-facing listener in `node::seed_main`) handle the actual I/O, the
//! way the teacher's `ConsensusEngine` separates round/vote bookkeeping
//! from block production.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::identity::NodeId;
use crate::membership::proposal::{Proposal, ProposalStatus};
use crate::membership::MembershipStore;
use crate::seeds::SeedDirectory;
use crate::wire::message::{ProposalKind, Vote};

/// Errors the coordinator can report back to a caller driving it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("proposal {0} not found (already terminal or unknown id)")]
    UnknownProposal(Uuid),
}

/// The final outcome of a proposal, returned once it leaves PENDING.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
}

/// What the originator should do right after accepting a REGISTER_REQUEST
/// or DEAD_NODE_REPORT.
pub enum OriginationOutcome {
    /// The subject's state already satisfies the request; no proposal was
    /// run. REGISTER of an existing member, or REMOVE of a non-member.
    Idempotent,
    /// A new proposal is now PENDING; the caller must broadcast
    /// `PROPOSE_REGISTER`/`PROPOSE_REMOVE` to every other seed and start a
    /// deadline timer.
    Started { proposal_id: Uuid },
    /// The originator's own self-vote already decided the outcome — a
    /// single-seed cluster (quorum = 1) never needs another seed's vote.
    /// The caller should skip broadcasting proposals entirely and act on
    /// `decision` directly.
    Resolved { proposal_id: Uuid, decision: Decision },
}

/// Runs proposals for a single seed.
pub struct Coordinator {
    self_id: NodeId,
    directory: SeedDirectory,
    membership: MembershipStore,
    proposals: DashMap<Uuid, Proposal>,
}

impl Coordinator {
    pub fn new(self_id: NodeId, directory: SeedDirectory, membership: MembershipStore) -> Self {
        Self {
            self_id,
            directory,
            membership,
            proposals: DashMap::new(),
        }
    }

    /// This seed's own identity, used by the caller to exclude itself when
    /// fanning out proposals and sync messages.
    pub fn self_id(&self) -> &NodeId {
        &self.self_id
    }

    pub fn membership(&self) -> &MembershipStore {
        &self.membership
    }

    pub fn directory(&self) -> &SeedDirectory {
        &self.directory
    }

    /// Originator step for a `REGISTER_REQUEST{peer}`. Idempotency check
    /// per spec: if `peer` is already a member, no proposal runs.
    pub fn originate_register(&self, peer: NodeId, deadline: Duration) -> OriginationOutcome {
        if self.membership.contains(&peer) {
            info!(%peer, "REGISTER_REQUEST for existing member, idempotent ACK");
            return OriginationOutcome::Idempotent;
        }
        self.start_proposal(ProposalKind::Register, peer, deadline)
    }

    /// Originator step for a `DEAD_NODE_REPORT{subject, ...}`. Per spec: a
    /// report about a non-member short-circuits silently (the "bogus
    /// report" error case) — no proposal, no state change.
    pub fn originate_remove(&self, subject: NodeId, deadline: Duration) -> OriginationOutcome {
        if !self.membership.contains(&subject) {
            info!(%subject, "DEAD_NODE_REPORT for non-member, ignoring");
            return OriginationOutcome::Idempotent;
        }
        self.start_proposal(ProposalKind::Remove, subject, deadline)
    }

    fn start_proposal(
        &self,
        kind: ProposalKind,
        subject: NodeId,
        deadline: Duration,
    ) -> OriginationOutcome {
        let proposal_id = Uuid::new_v4();
        let mut proposal = Proposal::new(
            proposal_id,
            kind,
            subject,
            self.self_id.clone(),
            Instant::now() + deadline,
        );
        // Originator self-votes YES: for REGISTER it's proposing the peer
        // in good faith, for REMOVE it's trusting its own reporter.
        proposal.record_vote(self.self_id.clone(), Vote::Yes);
        self.proposals.insert(proposal_id, proposal);

        // A single-seed directory reaches quorum on the self-vote alone;
        // no other seed is ever going to be asked, so resolve right here.
        match self.try_resolve(proposal_id) {
            Some(decision) => OriginationOutcome::Resolved { proposal_id, decision },
            None => OriginationOutcome::Started { proposal_id },
        }
    }

    /// Voter-side decision for an incoming `PROPOSE_REGISTER`/
    /// `PROPOSE_REMOVE`. Pure function of current membership state —
    /// deterministic so that two proposals on the same subject within a
    /// voter's window always get the same vote.
    ///
    /// REGISTER: votes YES whether or not the peer is already a member
    /// (idempotent-repeat is benign, the policy this implementation picked
    /// per the spec's documented open choice). REMOVE: YES iff the peer IS
    /// currently a member, else NO.
    pub fn decide_vote(&self, kind: ProposalKind, subject: &NodeId) -> Vote {
        match kind {
            ProposalKind::Register => Vote::Yes,
            ProposalKind::Remove => {
                if self.membership.contains(subject) {
                    Vote::Yes
                } else {
                    Vote::No
                }
            }
        }
    }

    /// Records a voter's own vote against a proposal it is originating
    /// (used when this seed is both originator and a voter records are
    /// tracked centrally) or — on the voter side, when acting as the
    /// *subject* of a PROPOSE_* this seed didn't originate but must still
    /// remember it voted on, should it later originate a duplicate.
    /// Primarily used to apply an incoming `VOTE{proposal_id, vote, voter}`
    /// to a proposal this seed is originating.
    pub fn record_vote(
        &self,
        proposal_id: Uuid,
        voter: NodeId,
        vote: Vote,
    ) -> Result<Option<Decision>, ConsensusError> {
        {
            let mut entry = self
                .proposals
                .get_mut(&proposal_id)
                .ok_or(ConsensusError::UnknownProposal(proposal_id))?;

            if entry.status != ProposalStatus::Pending {
                // Vote arrived after the proposal already terminated; discard.
                return Ok(None);
            }

            entry.record_vote(voter, vote);
        }

        Ok(self.try_resolve(proposal_id))
    }

    /// Checks a still-PENDING proposal's current tally against quorum and
    /// settles it if the outcome is already decided — either committed on
    /// reaching quorum, or rejected once quorum is provably unreachable.
    /// A no-op, returning `None`, for any proposal that is missing, already
    /// terminal, or genuinely still undecided.
    ///
    /// Called both after a voter's `VOTE` arrives and right after the
    /// originator's own self-vote, since a single-seed cluster (quorum = 1)
    /// can already be decided before any other seed is even asked.
    fn try_resolve(&self, proposal_id: Uuid) -> Option<Decision> {
        let mut entry = self.proposals.get_mut(&proposal_id)?;
        if entry.status != ProposalStatus::Pending {
            return None;
        }

        let quorum = self.directory.quorum();
        let total = self.directory.len();

        if entry.has_quorum(quorum) {
            entry.status = ProposalStatus::Approved;
            drop(entry);
            return Some(self.commit(proposal_id));
        }

        if !entry.can_still_reach_quorum(quorum, total) {
            entry.status = ProposalStatus::Rejected;
            let kind = entry.kind;
            let subject = entry.subject_peer.clone();
            drop(entry);
            warn!(?kind, %subject, "CONSENSUS OUTCOME — REJECTED (quorum unreachable)");
            return Some(Decision::Rejected);
        }

        None
    }

    /// Forces a still-PENDING proposal past its deadline to REJECTED. No-op
    /// if the proposal already terminated or reached quorum in the
    /// meantime — callers should call [`Coordinator::record_vote`] first
    /// in the same tick before falling back to this.
    pub fn expire_if_pending(&self, proposal_id: Uuid) -> Result<Option<Decision>, ConsensusError> {
        let mut entry = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(ConsensusError::UnknownProposal(proposal_id))?;

        if entry.status != ProposalStatus::Pending {
            return Ok(None);
        }
        if Instant::now() < entry.deadline {
            return Ok(None);
        }

        entry.status = ProposalStatus::Rejected;
        let kind = entry.kind;
        let subject = entry.subject_peer.clone();
        drop(entry);
        warn!(?kind, %subject, "CONSENSUS OUTCOME — REJECTED (deadline)");
        Ok(Some(Decision::Rejected))
    }

    fn commit(&self, proposal_id: Uuid) -> Decision {
        let proposal = self
            .proposals
            .get(&proposal_id)
            .expect("proposal present, just inserted a status for it above")
            .clone();

        match proposal.kind {
            ProposalKind::Register => {
                self.membership.insert(proposal.subject_peer.clone());
            }
            ProposalKind::Remove => {
                self.membership.remove(&proposal.subject_peer);
            }
        }

        info!(
            kind = ?proposal.kind,
            subject = %proposal.subject_peer,
            "CONSENSUS OUTCOME — APPROVED"
        );
        Decision::Approved
    }

    /// Looks up a proposal's current status, for diagnostics/tests.
    pub fn proposal_status(&self, proposal_id: Uuid) -> Option<ProposalStatus> {
        self.proposals.get(&proposal_id).map(|p| p.status)
    }

    /// Drops terminal proposals from the table. Proposals are ephemeral
    /// per spec; callers invoke this periodically to bound memory.
    pub fn reap_terminal(&self) {
        self.proposals
            .retain(|_, p| p.status == ProposalStatus::Pending);
    }

    /// Applies a `REMOVAL_NOTIFY{peer}` received from the proposal's
    /// originator: a voter never removes on its own vote tally, only upon
    /// this informational broadcast after the originator's commit.
    pub fn apply_removal_notify(&self, peer: &NodeId) {
        if self.membership.remove(peer) {
            info!(%peer, "applied REMOVAL_NOTIFY");
        }
    }

    /// Applies an incoming `SYNC_MEMBERSHIP{members}` exchange: unions the
    /// remote's committed set into ours. Returns the members newly learned.
    /// Never removes — a member missing from the remote's view might just be
    /// a partitioned seed's stale snapshot; removal only ever happens
    /// through a REMOVE proposal reaching quorum.
    pub fn apply_sync(&self, members: Vec<NodeId>) -> Vec<NodeId> {
        self.membership.union(members)
    }
}
