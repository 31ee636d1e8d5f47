// Copyright (c) 2026 Meshring Contributors. MIT License.
// See LICENSE for details.

//! # Meshring Protocol — Core Library
//!
//! A peer-to-peer overlay network with consensus-driven membership. A small
//! cluster of **seed** nodes acts as the membership authority; a larger,
//! dynamic population of **peer** nodes forms a gossip overlay. Admitting a
//! new peer, or evicting a dead one, requires agreement by a strict majority
//! of the seed cluster. Evicting a peer additionally requires agreement by a
//! majority of its immediate neighbors before the seeds are even asked.
//!
//! ## Architecture
//!
//! - **identity** — node addressing (`host:port`) shared by every component.
//! - **wire** — the newline-terminated JSON message framing and the full
//!   set of message types exchanged between nodes.
//! - **seeds** — the immutable seed directory and the anti-entropy sync loop
//!   seeds run against each other.
//! - **membership** — the replicated set of alive peers and the transient
//!   proposal records used to change it.
//! - **consensus** — the seed-quorum coordinator that runs REGISTER/REMOVE
//!   proposals to completion.
//! - **overlay** — Zipf-weighted neighbor selection from the peer list.
//! - **gossip** — capped, deduplicated message dissemination between peers.
//! - **liveness** — neighbor probing and peer-quorum death confirmation.
//! - **events** — the append-only structured event log.
//! - **config** — every tunable constant in one place.

pub mod config;
pub mod consensus;
pub mod events;
pub mod gossip;
pub mod identity;
pub mod liveness;
pub mod membership;
pub mod overlay;
pub mod seeds;
pub mod wire;
