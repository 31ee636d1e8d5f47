//! # Liveness Detector
//!
//! Periodic PING/PONG probing of neighbors, escalating a run of missed
//! probes into peer-level consensus on suspicion, and finally a
//! `DEAD_NODE_REPORT` to the seed cluster. Pure tally/state-machine logic
//! here; the actual PING scheduling and socket I/O live in `node::peer_main`.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::MISS_THRESHOLD;
use crate::identity::NodeId;
use crate::wire::message::Verdict;

/// A suspicion in progress for one neighbor.
#[derive(Debug, Clone)]
pub struct SuspectRecord {
    pub subject: NodeId,
    pub first_suspected_at: Instant,
    pub responses: HashMap<NodeId, Verdict>,
}

impl SuspectRecord {
    fn new(subject: NodeId, now: Instant) -> Self {
        Self {
            subject,
            first_suspected_at: now,
            responses: HashMap::new(),
        }
    }
}

/// Outcome of tallying a suspect record's responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspicionOutcome {
    /// Enough DEAD votes (including self) to confirm. Caller should emit a
    /// `DEAD_NODE_REPORT` and drop the record.
    Confirmed,
    /// Not enough evidence yet; record remains open awaiting more replies.
    Inconclusive,
    /// Majority thinks the subject is alive; discard the record and reset
    /// the miss counter.
    Refuted,
}

/// Per-neighbor miss counters plus any open suspect record, guarded behind
/// one lock per peer (matching the teacher's single-mutex-per-concern
/// policy for this kind of small, frequently-touched state).
pub struct LivenessDetector {
    self_id: NodeId,
    miss_counts: Mutex<HashMap<NodeId, u32>>,
    suspects: Mutex<HashMap<NodeId, SuspectRecord>>,
}

impl LivenessDetector {
    pub fn new(self_id: NodeId) -> Self {
        Self {
            self_id,
            miss_counts: Mutex::new(HashMap::new()),
            suspects: Mutex::new(HashMap::new()),
        }
    }

    /// A PONG (or any fresh evidence of life) from `neighbor` resets its
    /// miss counter and clears any open suspicion.
    pub fn record_alive(&self, neighbor: &NodeId) {
        self.miss_counts.lock().remove(neighbor);
        self.suspects.lock().remove(neighbor);
    }

    /// Records one missed probe for `neighbor`. Returns `true` if this
    /// miss pushed the neighbor past [`MISS_THRESHOLD`] and a suspect
    /// record was opened (it's a no-op if one was already open).
    pub fn record_miss(&self, neighbor: &NodeId, now: Instant) -> bool {
        let mut counts = self.miss_counts.lock();
        let count = counts.entry(neighbor.clone()).or_insert(0);
        *count += 1;

        if *count < MISS_THRESHOLD {
            return false;
        }

        let mut suspects = self.suspects.lock();
        if suspects.contains_key(neighbor) {
            return false;
        }
        info!(%neighbor, "suspicion started after {} consecutive missed probes", count);
        suspects.insert(neighbor.clone(), SuspectRecord::new(neighbor.clone(), now));
        true
    }

    pub fn is_suspect(&self, neighbor: &NodeId) -> bool {
        self.suspects.lock().contains_key(neighbor)
    }

    /// Records a `SUSPECT_RESPONSE` from `responder` about `subject`.
    pub fn record_response(&self, subject: &NodeId, responder: NodeId, verdict: Verdict) {
        let mut suspects = self.suspects.lock();
        if let Some(record) = suspects.get_mut(subject) {
            debug!(%subject, %responder, ?verdict, "received suspect response");
            record.responses.insert(responder, verdict);
        }
    }

    /// Tallies a suspect record per spec: `m` = non-UNKNOWN responses plus
    /// self (self always counts as DEAD). Confirmed iff
    /// `DEAD_count > floor(m/2)`.
    ///
    /// `other_neighbor_count` is how many *other* neighbors self has to
    /// query. When it's zero, self's own DEAD vote is the entire cohort
    /// (`m = 1`), and `floor(1/2) = 0 < 1` confirms immediately — this is
    /// the resolved policy for the degenerate too-few-neighbors case.
    pub fn tally(&self, subject: &NodeId, other_neighbor_count: usize) -> SuspicionOutcome {
        let suspects = self.suspects.lock();
        let record = match suspects.get(subject) {
            Some(r) => r,
            None => return SuspicionOutcome::Inconclusive,
        };

        if other_neighbor_count == 0 {
            return SuspicionOutcome::Confirmed;
        }

        let non_unknown: Vec<&Verdict> = record
            .responses
            .values()
            .filter(|v| **v != Verdict::Unknown)
            .collect();

        let dead_count = non_unknown.iter().filter(|v| ***v == Verdict::Dead).count() + 1; // self
        let m = non_unknown.len() + 1;

        if dead_count > m / 2 {
            SuspicionOutcome::Confirmed
        } else if record.responses.len() < other_neighbor_count {
            SuspicionOutcome::Inconclusive
        } else {
            SuspicionOutcome::Refuted
        }
    }

    /// Confirms and removes the suspect record, returning the canonical
    /// `DEAD_NODE_REPORT` body string per spec:
    /// `Dead Node:<N.host>:<N.port>:<ts>:<self.host>`.
    pub fn confirm_and_report(&self, subject: &NodeId, timestamp: &str) -> String {
        self.suspects.lock().remove(subject);
        let body = format!(
            "Dead Node:{}:{}:{}:{}",
            subject.host, subject.port, timestamp, self.self_id.host
        );
        warn!(%subject, "suspicion CONFIRMED, emitting DEAD_NODE_REPORT");
        body
    }

    /// Discards a suspect record without confirming (refuted), resetting
    /// the miss counter so probing starts clean.
    pub fn refute(&self, subject: &NodeId) {
        self.suspects.lock().remove(subject);
        self.miss_counts.lock().remove(subject);
    }

    pub fn miss_count(&self, neighbor: &NodeId) -> u32 {
        self.miss_counts.lock().get(neighbor).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn id(p: u16) -> NodeId {
        NodeId::new("127.0.0.1", p)
    }

    #[test]
    fn miss_counter_increments_and_opens_suspect_at_threshold() {
        let det = LivenessDetector::new(id(7000));
        let n = id(7004);
        let now = Instant::now();
        assert!(!det.record_miss(&n, now));
        assert!(!det.record_miss(&n, now));
        assert!(det.record_miss(&n, now));
        assert!(det.is_suspect(&n));
        assert_eq!(det.miss_count(&n), MISS_THRESHOLD);
    }

    #[test]
    fn record_alive_clears_counter_and_suspicion() {
        let det = LivenessDetector::new(id(7000));
        let n = id(7004);
        let now = Instant::now();
        det.record_miss(&n, now);
        det.record_miss(&n, now);
        det.record_miss(&n, now);
        assert!(det.is_suspect(&n));
        det.record_alive(&n);
        assert!(!det.is_suspect(&n));
        assert_eq!(det.miss_count(&n), 0);
    }

    #[test]
    fn tally_confirms_with_zero_other_neighbors() {
        let det = LivenessDetector::new(id(7000));
        let n = id(7004);
        det.record_miss(&n, Instant::now());
        det.record_miss(&n, Instant::now());
        det.record_miss(&n, Instant::now());
        assert_eq!(det.tally(&n, 0), SuspicionOutcome::Confirmed);
    }

    #[test]
    fn tally_confirms_when_majority_say_dead() {
        let det = LivenessDetector::new(id(7000));
        let n = id(7004);
        det.record_miss(&n, Instant::now());
        det.record_miss(&n, Instant::now());
        det.record_miss(&n, Instant::now());
        det.record_response(&n, id(7001), Verdict::Dead);
        // self DEAD + 7001 DEAD = 2 of m=2 -> 2 > 1 confirmed.
        assert_eq!(det.tally(&n, 1), SuspicionOutcome::Confirmed);
    }

    #[test]
    fn tally_refutes_when_majority_say_alive() {
        let det = LivenessDetector::new(id(7000));
        let n = id(7004);
        det.record_miss(&n, Instant::now());
        det.record_miss(&n, Instant::now());
        det.record_miss(&n, Instant::now());
        det.record_response(&n, id(7001), Verdict::Alive);
        det.record_response(&n, id(7002), Verdict::Alive);
        // self DEAD, two ALIVE: m=3, dead_count=1, 1 > 1 is false -> not confirmed.
        // all expected responses in (other_neighbor_count=2) -> Refuted.
        assert_eq!(det.tally(&n, 2), SuspicionOutcome::Refuted);
    }

    #[test]
    fn tally_is_inconclusive_while_responses_still_outstanding() {
        let det = LivenessDetector::new(id(7000));
        let n = id(7004);
        det.record_miss(&n, Instant::now());
        det.record_miss(&n, Instant::now());
        det.record_miss(&n, Instant::now());
        det.record_response(&n, id(7001), Verdict::Alive);
        // Expecting 2 responses total, only 1 in so far.
        assert_eq!(det.tally(&n, 2), SuspicionOutcome::Inconclusive);
    }

    #[test]
    fn unknown_verdicts_are_excluded_from_the_tally() {
        let det = LivenessDetector::new(id(7000));
        let n = id(7004);
        det.record_miss(&n, Instant::now());
        det.record_miss(&n, Instant::now());
        det.record_miss(&n, Instant::now());
        det.record_response(&n, id(7001), Verdict::Unknown);
        // Only response is UNKNOWN, excluded -> m=1 (self only) -> confirmed.
        assert_eq!(det.tally(&n, 1), SuspicionOutcome::Confirmed);
    }

    #[test]
    fn confirm_and_report_produces_canonical_body_and_clears_record() {
        let det = LivenessDetector::new(id(7000));
        let n = id(7004);
        det.record_miss(&n, Instant::now());
        det.record_miss(&n, Instant::now());
        det.record_miss(&n, Instant::now());
        let body = det.confirm_and_report(&n, "2026-07-27T00:00:00Z");
        assert_eq!(
            body,
            "Dead Node:127.0.0.1:7004:2026-07-27T00:00:00Z:127.0.0.1"
        );
        assert!(!det.is_suspect(&n));
    }

    #[test]
    fn tally_on_unknown_subject_is_inconclusive() {
        let det = LivenessDetector::new(id(7000));
        assert_eq!(det.tally(&id(9999), 2), SuspicionOutcome::Inconclusive);
    }
}
