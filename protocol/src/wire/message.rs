//! # Wire Message Types
//!
//! The full set of JSON payloads exchanged between nodes, one variant per
//! `type` field value. `serde`'s internally-tagged representation keys off
//! `type` directly, so encoding a `Message` and decoding it back always
//! round-trips through the same variant.

use serde::{Deserialize, Serialize};

use crate::identity::NodeId;

/// A vote cast by a seed on a pending proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vote {
    Yes,
    No,
}

/// The kind of membership change a proposal seeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProposalKind {
    Register,
    Remove,
}

/// A neighbor's verdict about a suspect's liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Alive,
    Dead,
    Unknown,
}

/// Every wire message, tagged by its `type` field.
///
/// Unknown `type` values fail to deserialize into this enum directly; the
/// frame codec (`wire::codec`) checks the raw `type` tag against
/// [`Message::is_known_type`] before reporting an error, so an unrecognized
/// type is silently ignored rather than logged as a malformed frame. Only a
/// missing `type` field, or JSON that fails to parse at all, is a genuine
/// framing error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "REGISTER_REQUEST")]
    RegisterRequest { peer: NodeId },

    #[serde(rename = "REGISTER_ACK")]
    RegisterAck {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    #[serde(rename = "REGISTER_NACK")]
    RegisterNack {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    #[serde(rename = "GET_PEER_LIST")]
    GetPeerList,

    #[serde(rename = "PEER_LIST")]
    PeerList { members: Vec<NodeId> },

    #[serde(rename = "PROPOSE_REGISTER")]
    ProposeRegister {
        proposal_id: String,
        peer: NodeId,
        originator: NodeId,
    },

    #[serde(rename = "PROPOSE_REMOVE")]
    ProposeRemove {
        proposal_id: String,
        peer: NodeId,
        originator: NodeId,
    },

    #[serde(rename = "VOTE")]
    VoteMsg {
        proposal_id: String,
        vote: Vote,
        voter: NodeId,
    },

    #[serde(rename = "REMOVAL_NOTIFY")]
    RemovalNotify { peer: NodeId },

    #[serde(rename = "SYNC_MEMBERSHIP")]
    SyncMembership { members: Vec<NodeId> },

    #[serde(rename = "GOSSIP")]
    Gossip {
        msg_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        hash: String,
        sender: NodeId,
    },

    #[serde(rename = "PING")]
    Ping,

    #[serde(rename = "PONG")]
    Pong,

    #[serde(rename = "SUSPECT_QUERY")]
    SuspectQuery { subject: NodeId },

    #[serde(rename = "SUSPECT_RESPONSE")]
    SuspectResponse { subject: NodeId, verdict: Verdict },

    #[serde(rename = "DEAD_NODE_REPORT")]
    DeadNodeReport {
        subject: NodeId,
        reporter: NodeId,
        timestamp: String,
        body: String,
    },
}

impl Message {
    /// The wire `type` tag for this message, used in log lines.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Message::RegisterRequest { .. } => "REGISTER_REQUEST",
            Message::RegisterAck { .. } => "REGISTER_ACK",
            Message::RegisterNack { .. } => "REGISTER_NACK",
            Message::GetPeerList => "GET_PEER_LIST",
            Message::PeerList { .. } => "PEER_LIST",
            Message::ProposeRegister { .. } => "PROPOSE_REGISTER",
            Message::ProposeRemove { .. } => "PROPOSE_REMOVE",
            Message::VoteMsg { .. } => "VOTE",
            Message::RemovalNotify { .. } => "REMOVAL_NOTIFY",
            Message::SyncMembership { .. } => "SYNC_MEMBERSHIP",
            Message::Gossip { .. } => "GOSSIP",
            Message::Ping => "PING",
            Message::Pong => "PONG",
            Message::SuspectQuery { .. } => "SUSPECT_QUERY",
            Message::SuspectResponse { .. } => "SUSPECT_RESPONSE",
            Message::DeadNodeReport { .. } => "DEAD_NODE_REPORT",
        }
    }

    /// Every `type` tag this enum recognizes, used by the frame codec to
    /// tell "unknown message type" (ignore) apart from a genuinely
    /// malformed frame (log and report).
    pub fn is_known_type(tag: &str) -> bool {
        const KNOWN_TYPES: &[&str] = &[
            "REGISTER_REQUEST",
            "REGISTER_ACK",
            "REGISTER_NACK",
            "GET_PEER_LIST",
            "PEER_LIST",
            "PROPOSE_REGISTER",
            "PROPOSE_REMOVE",
            "VOTE",
            "REMOVAL_NOTIFY",
            "SYNC_MEMBERSHIP",
            "GOSSIP",
            "PING",
            "PONG",
            "SUSPECT_QUERY",
            "SUSPECT_RESPONSE",
            "DEAD_NODE_REPORT",
        ];
        KNOWN_TYPES.contains(&tag)
    }
}
