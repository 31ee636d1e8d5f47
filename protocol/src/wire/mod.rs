//! # Wire Protocol
//!
//! Newline-terminated JSON framing (`codec`) plus the full set of typed
//! payloads (`message`) exchanged between nodes.

pub mod codec;
pub mod message;

pub use codec::{encode, FrameDecoder, FrameError};
pub use message::{Message, ProposalKind, Verdict, Vote};
