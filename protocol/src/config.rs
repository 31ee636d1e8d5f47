//! # Protocol Configuration & Constants
//!
//! Every tunable in meshring lives here: proposal deadlines, gossip cadence,
//! liveness timing, and the Zipf exponent the overlay builder samples with.
//! Changing these after a cluster is live just means nodes disagree about
//! timing, not about correctness — the protocol tolerates divergent local
//! clocks and divergent config as long as quorum arithmetic still holds.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Consensus timing
// ---------------------------------------------------------------------------

/// How long a proposal originator waits for votes before aborting as
/// REJECTED. Recommended by spec: 3 seconds.
pub const PROPOSAL_DEADLINE: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// Gossip
// ---------------------------------------------------------------------------

/// Interval between successive gossip generations at a peer.
pub const GOSSIP_INTERVAL: Duration = Duration::from_secs(5);

/// Hard cap on the number of messages a single peer ever originates.
/// Generation `seq` runs `1..=MAX_GOSSIP` and then stops permanently.
pub const MAX_GOSSIP: u32 = 10;

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

/// Interval between PING probes sent to each neighbor.
pub const PING_INTERVAL: Duration = Duration::from_secs(5);

/// How long to wait for a PONG before counting the probe as a miss.
pub const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Consecutive misses before a neighbor enters suspicion.
pub const MISS_THRESHOLD: u32 = 3;

// ---------------------------------------------------------------------------
// Seed sync
// ---------------------------------------------------------------------------

/// Interval between anti-entropy SYNC_MEMBERSHIP exchanges among seeds.
pub const SYNC_INTERVAL: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Overlay builder
// ---------------------------------------------------------------------------

/// Zipf exponent used to weight neighbor candidates by rank.
pub const ZIPF_ALPHA: f64 = 1.0;

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Network I/O timeout applied to individual TCP reads, writes, and connects
/// unless a component specifies a different timeout of its own (liveness
/// probes use `PING_TIMEOUT` instead).
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(2);

/// Sanity ceiling on a single framed wire message. Connections that send a
/// message larger than this are dropped.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;
